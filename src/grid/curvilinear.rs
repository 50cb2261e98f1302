//! Curvilinear horizontal grids defined by 2-D node coordinate arrays.

use super::{GridQuery, HorGrid, Topology};
use crate::{constants, error::GeometryError, num::PFloat};
use ndarray::Array2;

/// A horizontal grid whose cells are arbitrary quadrilaterals, defined
/// by 2-D arrays of node (cell-corner) longitudes and latitudes.
///
/// There is no global monotonic coordinate, so index location finds an
/// approximate nearest node first and then refines by inverting the
/// local bilinear map of the enclosing quadrilateral.
///
/// A grid whose nodes ring the full longitude circle along the first
/// array dimension is periodic in x, and cell walks wrap across the
/// seam between the last and first cell columns.
#[derive(Clone, Debug)]
pub struct CurvilinearGrid<F> {
    node_lons: Array2<F>,
    node_lats: Array2<F>,
    shape: (usize, usize),
    topology: Topology,
}

impl<F: PFloat> CurvilinearGrid<F> {
    /// Creates a new grid from node coordinate arrays of shape
    /// `(nx + 1, ny + 1)` for a grid of `nx` by `ny` cells.
    pub fn from_nodes(node_lons: Array2<F>, node_lats: Array2<F>) -> Self {
        assert_eq!(
            node_lons.dim(),
            node_lats.dim(),
            "Node longitude and latitude arrays must have the same shape"
        );
        let (n_nodes_x, n_nodes_y) = node_lons.dim();
        assert!(
            n_nodes_x >= 2 && n_nodes_y >= 2,
            "Cannot create grid with fewer than two nodes along any dimension"
        );

        // Unwrap the first node row into a monotonic longitude sequence
        // so that a ring of nodes spanning the full circle classifies
        // as periodic regardless of the stored longitude convention.
        let mut seam_lons = Vec::with_capacity(n_nodes_x);
        let mut previous = node_lons[[0, 0]];
        seam_lons.push(previous);
        for i in 1..n_nodes_x {
            previous = previous + wrap_degrees(node_lons[[i, 0]] - previous);
            seam_lons.push(previous);
        }
        let topology = Topology::classify(&seam_lons[..n_nodes_x - 1], seam_lons[n_nodes_x - 1]);

        Self {
            node_lons,
            node_lats,
            shape: (n_nodes_x - 1, n_nodes_y - 1),
            topology,
        }
    }

    /// Returns the node longitude array.
    pub fn node_lons(&self) -> &Array2<F> {
        &self.node_lons
    }

    /// Returns the node latitude array.
    pub fn node_lats(&self) -> &Array2<F> {
        &self.node_lats
    }

    /// Finds the node closest to the given coordinate by scanning all
    /// nodes, measuring longitude differences modulo 360 degrees and
    /// weighting them by the local latitude cosine.
    fn nearest_node(&self, lon: F, lat: F) -> (usize, usize) {
        let cos_lat = (lat * F::from_f64(constants::DEG_TO_RAD).unwrap()).cos();
        let mut best = (0, 0);
        let mut best_dist = F::infinity();
        for ((i, j), (&node_lon, &node_lat)) in self
            .node_lons
            .indexed_iter()
            .zip(self.node_lats.iter())
            .map(|((index, lon), lat)| (index, (lon, lat)))
        {
            let dlon = wrap_degrees(node_lon - lon) * cos_lat;
            let dlat = node_lat - lat;
            let dist = dlon * dlon + dlat * dlat;
            if dist < best_dist {
                best_dist = dist;
                best = (i, j);
            }
        }
        best
    }

    /// Returns the four corner positions of the given cell, with corner
    /// longitudes unwrapped to lie within half a circle of the first so
    /// that cells straddling the dateline stay contiguous.
    fn cell_corners(&self, i: usize, j: usize) -> [(F, F); 4] {
        let reference_lon = self.node_lons[[i, j]];
        let corner = |ci: usize, cj: usize| {
            (
                reference_lon + wrap_degrees(self.node_lons[[ci, cj]] - reference_lon),
                self.node_lats[[ci, cj]],
            )
        };
        [
            corner(i, j),
            corner(i + 1, j),
            corner(i, j + 1),
            corner(i + 1, j + 1),
        ]
    }

    /// Inverts the bilinear map of one cell for the given target
    /// coordinate using a bounded Newton iteration.
    ///
    /// Returns the fractional offsets within the cell, or `None` for a
    /// singular (degenerate) cell. Convergence is declared when the
    /// update falls below [`constants::CURVILINEAR_INVERSION_TOLERANCE`]
    /// in fractional cell units; the iteration never runs more than
    /// [`constants::CURVILINEAR_INVERSION_MAX_ITERATIONS`] times.
    fn invert_cell(&self, i: usize, j: usize, lon: F, lat: F) -> Option<(F, F)> {
        let [p00, p10, p01, p11] = self.cell_corners(i, j);
        let target_lon = p00.0 + wrap_degrees(lon - p00.0);

        let ex = p11.0 - p10.0 - p01.0 + p00.0;
        let ey = p11.1 - p10.1 - p01.1 + p00.1;

        let half = F::from_f64(0.5).unwrap();
        let tolerance = F::from_f64(constants::CURVILINEAR_INVERSION_TOLERANCE).unwrap();
        let mut a = half;
        let mut b = half;

        for _ in 0..constants::CURVILINEAR_INVERSION_MAX_ITERATIONS {
            let residual_x =
                p00.0 + a * (p10.0 - p00.0) + b * (p01.0 - p00.0) + a * b * ex - target_lon;
            let residual_y = p00.1 + a * (p10.1 - p00.1) + b * (p01.1 - p00.1) + a * b * ey - lat;

            let jxx = (p10.0 - p00.0) + b * ex;
            let jxy = (p01.0 - p00.0) + a * ex;
            let jyx = (p10.1 - p00.1) + b * ey;
            let jyy = (p01.1 - p00.1) + a * ey;

            let det = jxx * jyy - jxy * jyx;
            if det.abs() < F::epsilon() {
                return None;
            }

            let da = (residual_x * jyy - residual_y * jxy) / det;
            let db = (residual_y * jxx - residual_x * jyx) / det;
            a = a - da;
            b = b - db;

            if da.abs() + db.abs() < tolerance {
                return Some((a, b));
            }
        }
        // The bilinear map is mildly nonlinear, so the capped Newton
        // iteration is expected to have converged; return the best
        // estimate and let the caller judge whether it is in-cell.
        Some((a, b))
    }
}

/// Wraps an angular difference in degrees into the range [-180, 180).
fn wrap_degrees<F: PFloat>(delta: F) -> F {
    let full = F::from_f64(constants::FULL_CIRCLE_DEG).unwrap();
    let half = full / F::from_f64(2.0).unwrap();
    let wrapped = (delta + half) % full;
    if wrapped < F::zero() {
        wrapped + full - half
    } else {
        wrapped - half
    }
}

impl<F: PFloat> HorGrid<F> for CurvilinearGrid<F> {
    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn topology(&self) -> Topology {
        self.topology
    }

    fn locate(
        &self,
        lon: F,
        lat: F,
        best_effort: bool,
    ) -> Result<GridQuery<F, (F, F)>, GeometryError> {
        let (nx, ny) = self.shape;
        let (node_i, node_j) = self.nearest_node(lon, lat);
        let mut i = node_i.min(nx - 1);
        let mut j = node_j.min(ny - 1);

        let slack = F::from_f64(1e-9).unwrap();
        for _ in 0..constants::CURVILINEAR_MAX_CELL_MOVES {
            let (a, b) = match self.invert_cell(i, j, lon, lat) {
                Some(offsets) => offsets,
                None => {
                    return if best_effort {
                        let fi = F::from_usize(node_i.min(nx)).unwrap();
                        let fj = F::from_usize(node_j.min(ny)).unwrap();
                        Ok(GridQuery::Inside((fi, fj)))
                    } else {
                        Err(GeometryError::DegenerateCell { i, j })
                    };
                }
            };

            let in_a = a >= -slack && a <= F::one() + slack;
            let in_b = b >= -slack && b <= F::one() + slack;
            if in_a && in_b {
                let fi = F::from_usize(i).unwrap() + a.max(F::zero()).min(F::one());
                let fj = F::from_usize(j).unwrap() + b.max(F::zero()).min(F::one());
                // A longitude more than half a circle from the cell
                // reference corner was wrapped during inversion, so
                // report the canonical longitude back to the caller.
                let reference_lon = self.node_lons[[i, j]];
                let offset = lon - reference_lon;
                let half = F::from_f64(constants::FULL_CIRCLE_DEG / 2.0).unwrap();
                return Ok(if offset.abs() <= half {
                    GridQuery::Inside((fi, fj))
                } else {
                    GridQuery::MovedInside(((fi, fj), reference_lon + wrap_degrees(offset)))
                });
            }

            // Walk towards the neighboring cell the local solution
            // points at; leaving the node array means the coordinate
            // is outside the grid, except across the seam of a
            // periodic grid, where the walk wraps.
            let mut moved = false;
            if a < -slack {
                if i == 0 {
                    if self.topology != Topology::XPeriodic {
                        return Ok(GridQuery::Outside);
                    }
                    i = nx - 1;
                } else {
                    i -= 1;
                }
                moved = true;
            } else if a > F::one() + slack {
                if i + 1 >= nx {
                    if self.topology != Topology::XPeriodic {
                        return Ok(GridQuery::Outside);
                    }
                    i = 0;
                } else {
                    i += 1;
                }
                moved = true;
            }
            if b < -slack {
                if j == 0 {
                    return Ok(GridQuery::Outside);
                }
                j -= 1;
                moved = true;
            } else if b > F::one() + slack {
                if j + 1 >= ny {
                    return Ok(GridQuery::Outside);
                }
                j += 1;
                moved = true;
            }
            if !moved {
                break;
            }
        }
        Ok(GridQuery::Outside)
    }

    fn position_at(&self, fi: F, fj: F) -> (F, F) {
        let (nx, ny) = self.shape;
        let i = fi.floor().to_isize().unwrap_or(0).clamp(0, nx as isize - 1) as usize;
        let j = fj.floor().to_isize().unwrap_or(0).clamp(0, ny as isize - 1) as usize;
        let a = fi - F::from_usize(i).unwrap();
        let b = fj - F::from_usize(j).unwrap();

        let [p00, p10, p01, p11] = self.cell_corners(i, j);
        let one = F::one();
        let lon = (one - a) * (one - b) * p00.0
            + a * (one - b) * p10.0
            + (one - a) * b * p01.0
            + a * b * p11.0;
        let lat = (one - a) * (one - b) * p00.1
            + a * (one - b) * p10.1
            + (one - a) * b * p01.1
            + a * b * p11.1;
        (wrap_degrees(lon), lat)
    }
}
