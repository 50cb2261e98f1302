//! Grid topology and coordinate indexing for ocean-model grids.

pub mod curvilinear;
pub mod latlon;

use crate::{
    constants,
    error::GeometryError,
    geometry::{Dim3, FracIdx3, Point3},
    num::PFloat,
};

/// Boundary behavior of the horizontal grid along the x-axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Coordinates outside the axis range are rejected.
    Bounded,
    /// The x-axis spans the full longitude circle and wraps around.
    XPeriodic,
}

impl Topology {
    /// Classifies the boundary behavior of a longitude axis from its
    /// cell edges and upper bound.
    ///
    /// An axis spanning (approximately) a full 360 degree range is
    /// periodic; anything else, including degenerate axes with zero
    /// span, is bounded.
    pub fn classify<F: PFloat>(lower_edges: &[F], upper_bound: F) -> Self {
        let lower_bound = match lower_edges.first() {
            Some(&edge) => edge,
            None => return Self::Bounded,
        };
        let span = upper_bound - lower_bound;
        let full_circle = F::from_f64(constants::FULL_CIRCLE_DEG).unwrap();
        let tolerance = full_circle * F::from_f64(constants::PERIODIC_SPAN_TOLERANCE).unwrap();
        if (span - full_circle).abs() <= tolerance {
            Self::XPeriodic
        } else {
            Self::Bounded
        }
    }

    /// Reduces an out-of-range fractional index modulo the axis length.
    ///
    /// Only meaningful for periodic axes; bounded axes flag out-of-range
    /// indices through [`Topology::in_bounds`] instead.
    pub fn wrap<F: PFloat>(index: F, axis_length: usize) -> F {
        let length = F::from_usize(axis_length).unwrap();
        let wrapped = index % length;
        if wrapped < F::zero() {
            wrapped + length
        } else {
            wrapped
        }
    }

    /// Whether a fractional index lies within a bounded axis of the
    /// given length (the upper edge of the last cell is included).
    pub fn in_bounds<F: PFloat>(index: F, axis_length: usize) -> bool {
        index >= F::zero() && index <= F::from_usize(axis_length).unwrap()
    }
}

/// The result of querying a grid for the location of a coordinate.
#[derive(Clone, Debug, PartialEq)]
pub enum GridQuery<C, T> {
    /// The coordinate was inside the grid; contains the result of the query.
    Inside(T),
    /// The coordinate was wrapped across a periodic boundary; contains
    /// the result of the query and the wrapped coordinate.
    MovedInside((T, C)),
    /// The coordinate was outside a non-periodic boundary.
    Outside,
}

impl<C, T> GridQuery<C, T> {
    /// Returns the query result, writing the wrapped coordinate back to
    /// the given location if the query moved it, or `None` if the
    /// coordinate was outside the grid.
    pub fn unwrap_and_update_coord(self, coord: &mut C) -> Option<T> {
        match self {
            Self::Inside(result) => Some(result),
            Self::MovedInside((result, moved_coord)) => {
                *coord = moved_coord;
                Some(result)
            }
            Self::Outside => None,
        }
    }
}

/// A 1-D monotonic coordinate axis with cell centers and lower cell edges.
///
/// Coordinates must be strictly increasing. Used for rectilinear
/// longitude/latitude axes as well as the vertical axis (depths are
/// negative below the surface, so deeper levels come first).
///
/// Axes are bounded as constructed; only a longitude axis can be
/// periodic, via [`MonotonicAxis::classify_as_longitude`], so a depth
/// axis spanning 360 meters never wraps.
#[derive(Clone, Debug)]
pub struct MonotonicAxis<F> {
    centers: Vec<F>,
    lower_edges: Vec<F>,
    upper_bound: F,
    topology: Topology,
}

impl<F: PFloat> MonotonicAxis<F> {
    /// Creates a new axis from cell-center and lower-edge coordinate
    /// arrays.
    pub fn from_coords(centers: Vec<F>, lower_edges: Vec<F>) -> Self {
        let size = centers.len();
        assert_ne!(size, 0, "Cannot create axis with size zero");
        assert_eq!(
            lower_edges.len(),
            size,
            "Centers and lower edges must have the same shape"
        );
        let two = F::from_f64(2.0).unwrap();
        let upper_bound = lower_edges[size - 1] + two * (centers[size - 1] - lower_edges[size - 1]);
        Self {
            centers,
            lower_edges,
            upper_bound,
            topology: Topology::Bounded,
        }
    }

    /// Creates a new axis from an array of `size + 1` cell-edge coordinates.
    pub fn from_edges(edges: &[F]) -> Self {
        assert!(
            edges.len() >= 2,
            "Cannot create axis from fewer than two edges"
        );
        let half = F::from_f64(0.5).unwrap();
        let centers = edges
            .windows(2)
            .map(|pair| (pair[0] + pair[1]) * half)
            .collect();
        let lower_edges = edges[..edges.len() - 1].to_vec();
        let upper_bound = edges[edges.len() - 1];
        Self {
            centers,
            lower_edges,
            upper_bound,
            topology: Topology::Bounded,
        }
    }

    /// Creates a regular axis with the given number of cells covering
    /// the given bounds.
    pub fn regular(size: usize, lower_bound: F, upper_bound: F) -> Self {
        assert_ne!(size, 0, "Cannot create axis with size zero");
        let extent = upper_bound - lower_bound;
        let cell_extent = extent / F::from_usize(size).unwrap();
        let half = F::from_f64(0.5).unwrap();
        let lower_edges: Vec<F> = (0..size)
            .map(|i| lower_bound + F::from_usize(i).unwrap() * cell_extent)
            .collect();
        let centers = lower_edges
            .iter()
            .map(|&edge| edge + half * cell_extent)
            .collect();
        Self {
            centers,
            lower_edges,
            upper_bound,
            topology: Topology::Bounded,
        }
    }

    /// Classifies the axis as a longitude axis, marking it periodic
    /// when it spans the full circle.
    pub fn classify_as_longitude(mut self) -> Self {
        self.topology = Topology::classify(&self.lower_edges, self.upper_bound);
        self
    }

    /// Returns the number of grid cells along the axis.
    pub fn size(&self) -> usize {
        self.lower_edges.len()
    }

    /// Returns the cell-center coordinates.
    pub fn centers(&self) -> &[F] {
        &self.centers
    }

    /// Returns the lower cell-edge coordinates.
    pub fn lower_edges(&self) -> &[F] {
        &self.lower_edges
    }

    /// Returns the lower bound of the axis.
    pub fn lower_bound(&self) -> F {
        self.lower_edges[0]
    }

    /// Returns the upper bound of the axis.
    pub fn upper_bound(&self) -> F {
        self.upper_bound
    }

    /// Returns the full extent of the axis.
    pub fn extent(&self) -> F {
        self.upper_bound - self.lower_bound()
    }

    /// Returns the topology classification of the axis.
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Finds the fractional index of the given coordinate by binary
    /// search over the cell edges.
    ///
    /// Periodic axes normalize the coordinate modulo the axis extent
    /// before searching; bounded axes report out-of-range coordinates
    /// as `Outside`.
    pub fn fractional_index(&self, coord: F) -> GridQuery<F, F> {
        match self.topology {
            Topology::XPeriodic => {
                if coord >= self.lower_bound() && coord <= self.upper_bound {
                    GridQuery::Inside(self.search(coord))
                } else {
                    let wrapped = self.wrap_coord(coord);
                    GridQuery::MovedInside((self.search(wrapped), wrapped))
                }
            }
            Topology::Bounded => {
                if coord < self.lower_bound() || coord > self.upper_bound {
                    GridQuery::Outside
                } else {
                    GridQuery::Inside(self.search(coord))
                }
            }
        }
    }

    /// Returns the coordinate at the given fractional index, the exact
    /// inverse of [`MonotonicAxis::fractional_index`].
    pub fn coord_at(&self, index: F) -> F {
        let size = self.size();
        let cell = index
            .floor()
            .to_isize()
            .unwrap_or(0)
            .clamp(0, size as isize - 1) as usize;
        let offset = index - F::from_usize(cell).unwrap();
        let lower = self.lower_edges[cell];
        if offset == F::one() {
            // Exact at the upper edge; adding the full width to the
            // lower edge would not round-trip bit-for-bit.
            self.cell_upper_edge(cell)
        } else {
            lower + offset * (self.cell_upper_edge(cell) - lower)
        }
    }

    /// Reduces a coordinate into the axis range for periodic axes.
    fn wrap_coord(&self, coord: F) -> F {
        let extent = self.extent();
        let offset = (coord - self.lower_bound()) % extent;
        let offset = if offset < F::zero() {
            offset + extent
        } else {
            offset
        };
        self.lower_bound() + offset
    }

    fn cell_upper_edge(&self, cell: usize) -> F {
        if cell + 1 < self.size() {
            self.lower_edges[cell + 1]
        } else {
            self.upper_bound
        }
    }

    /// Locates the cell containing a coordinate known to lie in range.
    fn search(&self, coord: F) -> F {
        let cell = self
            .lower_edges
            .partition_point(|&edge| edge <= coord)
            .saturating_sub(1);
        // A coordinate exactly on the upper bound indexes as size,
        // which is the upper edge of the last cell.
        let lower = self.lower_edges[cell];
        let width = self.cell_upper_edge(cell) - lower;
        F::from_usize(cell).unwrap() + (coord - lower) / width
    }
}

/// Defines the properties of a horizontal grid.
pub trait HorGrid<F: PFloat>: Clone + Sync + Send {
    /// Returns the number of grid cells along the x- and y-axis.
    fn shape(&self) -> (usize, usize);

    /// Returns the topology classification of the grid.
    fn topology(&self) -> Topology;

    /// Finds the fractional cell indices of the given geographic
    /// coordinate, wrapping the longitude across a periodic boundary.
    ///
    /// With `best_effort` set, a degenerate curvilinear cell yields the
    /// nearest-node estimate instead of a `GeometryError`.
    fn locate(
        &self,
        lon: F,
        lat: F,
        best_effort: bool,
    ) -> Result<GridQuery<F, (F, F)>, GeometryError>;

    /// Returns the geographic coordinate at the given fractional cell
    /// indices, the inverse of [`HorGrid::locate`].
    fn position_at(&self, fi: F, fj: F) -> (F, F);
}

/// Immutable descriptor of a full model grid: a horizontal grid plus an
/// optional vertical axis.
///
/// Built once per dataset and shared read-only by all particles that
/// reference it.
#[derive(Clone, Debug)]
pub struct ModelGrid<F, H> {
    horizontal: H,
    vertical: Option<MonotonicAxis<F>>,
}

impl<F, H> ModelGrid<F, H>
where
    F: PFloat,
    H: HorGrid<F>,
{
    /// Creates a new grid descriptor. A grid without a vertical axis
    /// describes purely horizontal (surface) motion.
    pub fn new(horizontal: H, vertical: Option<MonotonicAxis<F>>) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// Returns a reference to the horizontal grid.
    pub fn horizontal(&self) -> &H {
        &self.horizontal
    }

    /// Returns a reference to the vertical axis, if any.
    pub fn vertical(&self) -> Option<&MonotonicAxis<F>> {
        self.vertical.as_ref()
    }

    /// Returns the number of vertical levels (one if the grid has no
    /// vertical axis).
    pub fn n_levels(&self) -> usize {
        self.vertical.as_ref().map_or(1, MonotonicAxis::size)
    }

    /// Returns the topology classification of the horizontal grid.
    pub fn topology(&self) -> Topology {
        self.horizontal.topology()
    }

    /// Finds the fractional grid indices of the given geographic
    /// position, wrapping the longitude across a periodic boundary.
    pub fn locate(
        &self,
        position: &Point3<F>,
        best_effort: bool,
    ) -> Result<GridQuery<Point3<F>, FracIdx3<F>>, GeometryError> {
        use Dim3::{X, Y, Z};
        let hor_query = self
            .horizontal
            .locate(position[X], position[Y], best_effort)?;
        let ((fi, fj), wrapped_lon) = match hor_query {
            GridQuery::Inside(indices) => (indices, None),
            GridQuery::MovedInside((indices, lon)) => (indices, Some(lon)),
            GridQuery::Outside => return Ok(GridQuery::Outside),
        };
        let fk = match &self.vertical {
            Some(axis) => match axis.fractional_index(position[Z]) {
                GridQuery::Inside(index) => index,
                // The vertical axis is never periodic.
                GridQuery::MovedInside(_) | GridQuery::Outside => return Ok(GridQuery::Outside),
            },
            None => F::zero(),
        };
        let indices = FracIdx3::new(fi, fj, fk);
        Ok(match wrapped_lon {
            None => GridQuery::Inside(indices),
            Some(lon) => {
                let moved = Point3::new(lon, position[Y], position[Z]);
                GridQuery::MovedInside((indices, moved))
            }
        })
    }

    /// Returns the geographic position at the given fractional grid
    /// indices, the inverse of [`ModelGrid::locate`].
    pub fn interpolate_position(&self, indices: &FracIdx3<F>) -> Point3<F> {
        use Dim3::{X, Y, Z};
        let (lon, lat) = self.horizontal.position_at(indices[X], indices[Y]);
        let depth = match &self.vertical {
            Some(axis) => axis.coord_at(indices[Z]),
            None => F::zero(),
        };
        Point3::new(lon, lat, depth)
    }
}
