//! Scalar fields sampled on model grids, velocity field triples and
//! their time series.

use crate::{
    constants,
    geometry::{Dim3, FracIdx3, In3D, Vec3},
    grid::{HorGrid, ModelGrid, Topology},
    num::PFloat,
};
use ndarray::Array3;
use std::sync::Arc;

/// Where within a grid cell the values of a field are defined along one
/// axis.
///
/// Velocity components on a staggered C-grid live on the lower cell
/// faces of their flow axis; scalars live at cell centers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordLocation {
    Center = 0,
    LowerEdge = 1,
}

/// A scalar field of 3D values, with the grid cell sub-position of the
/// values tagged per axis.
///
/// Undefined values (for example under a land mask) are represented as
/// NaN and excluded from interpolation.
#[derive(Clone, Debug)]
pub struct ScalarField3<F, H> {
    name: String,
    grid: Arc<ModelGrid<F, H>>,
    locations: In3D<CoordLocation>,
    values: Array3<F>,
}

impl<F, H> ScalarField3<F, H>
where
    F: PFloat,
    H: HorGrid<F>,
{
    /// Creates a new scalar field given the grid, the values and the
    /// coordinate locations specifying where in the grid cell the
    /// values are defined.
    ///
    /// The value array has shape `(nx, ny, nz)`; a field with a single
    /// vertical level on a grid with more levels is treated as having
    /// no vertical variation.
    pub fn new(
        name: String,
        grid: Arc<ModelGrid<F, H>>,
        locations: In3D<CoordLocation>,
        values: Array3<F>,
    ) -> Self {
        let (nx, ny) = grid.horizontal().shape();
        let (size_x, size_y, size_z) = values.dim();
        assert_eq!(
            (size_x, size_y),
            (nx, ny),
            "Field values must have the same horizontal shape as the grid"
        );
        assert!(
            size_z == 1 || size_z == grid.n_levels(),
            "Field values must have either one vertical level or one per grid level"
        );
        Self {
            name,
            grid,
            locations,
            values,
        }
    }

    /// Creates a new cell-centered scalar field.
    pub fn centered(name: String, grid: Arc<ModelGrid<F, H>>, values: Array3<F>) -> Self {
        Self::new(name, grid, In3D::same(CoordLocation::Center), values)
    }

    /// Returns the name of the field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a reference to the grid.
    pub fn grid(&self) -> &ModelGrid<F, H> {
        &self.grid
    }

    /// Returns a reference to the field values.
    pub fn values(&self) -> &Array3<F> {
        &self.values
    }

    /// Computes the interpolated field value at the given fractional
    /// grid indices.
    ///
    /// The fractional index is shifted according to the field's
    /// staggering before multilinear interpolation over the surrounding
    /// nodes. Node lookup wraps modulo the axis length at a periodic
    /// boundary and clamps at bounded boundaries. NaN nodes are
    /// excluded and the remaining weights renormalized; if no valid
    /// node remains the sample is undefined.
    pub fn sample(&self, indices: &FracIdx3<F>) -> Option<F> {
        use Dim3::{X, Y, Z};
        let (size_x, size_y, size_z) = self.values.dim();
        let x_periodic = self.grid.topology() == Topology::XPeriodic;

        let (ix, wx) = axis_nodes(indices[X], self.locations[X], size_x, x_periodic);
        let (iy, wy) = axis_nodes(indices[Y], self.locations[Y], size_y, false);
        let (iz, wz) = if size_z == 1 {
            // A 2-D field sampled as 3-D has no vertical variation.
            ([0, 0], F::zero())
        } else {
            axis_nodes(indices[Z], self.locations[Z], size_z, false)
        };

        let one = F::one();
        let weights_x = [one - wx, wx];
        let weights_y = [one - wy, wy];
        let weights_z = [one - wz, wz];

        let mut weighted_sum = F::zero();
        let mut total_weight = F::zero();
        for (k, &wz) in weights_z.iter().enumerate() {
            for (j, &wy) in weights_y.iter().enumerate() {
                for (i, &wx) in weights_x.iter().enumerate() {
                    let value = self.values[[ix[i], iy[j], iz[k]]];
                    if value.is_nan() {
                        continue;
                    }
                    let weight = wx * wy * wz;
                    weighted_sum = weighted_sum + value * weight;
                    total_weight = total_weight + weight;
                }
            }
        }
        if total_weight > F::zero() {
            Some(weighted_sum / total_weight)
        } else {
            None
        }
    }
}

/// Determines the two node indices bracketing a staggered fractional
/// index along one axis, together with the weight of the upper node.
fn axis_nodes<F: PFloat>(
    index: F,
    location: CoordLocation,
    size: usize,
    periodic: bool,
) -> ([usize; 2], F) {
    let half = F::from_f64(0.5).unwrap();
    let shifted = match location {
        CoordLocation::Center => index - half,
        CoordLocation::LowerEdge => index,
    };
    let floor = shifted.floor();
    let node = floor.to_isize().unwrap_or(0);
    let weight = shifted - floor;

    if periodic {
        let len = size as isize;
        let lower = node.rem_euclid(len) as usize;
        let upper = (node + 1).rem_euclid(len) as usize;
        ([lower, upper], weight)
    } else if node < 0 {
        ([0, 0], F::zero())
    } else if node + 1 >= size as isize {
        ([size - 1, size - 1], F::zero())
    } else {
        ([node as usize, node as usize + 1], weight)
    }
}

/// The (u, v, w) velocity component fields for one point in time.
///
/// The vertical component is optional; without it particles keep their
/// depth.
#[derive(Clone, Debug)]
pub struct VelocityField<F, H> {
    u: ScalarField3<F, H>,
    v: ScalarField3<F, H>,
    w: Option<ScalarField3<F, H>>,
}

impl<F, H> VelocityField<F, H>
where
    F: PFloat,
    H: HorGrid<F>,
{
    /// Creates a new velocity field from its component scalar fields.
    pub fn new(u: ScalarField3<F, H>, v: ScalarField3<F, H>, w: Option<ScalarField3<F, H>>) -> Self {
        Self { u, v, w }
    }

    /// Whether the field carries a vertical velocity component.
    pub fn has_vertical(&self) -> bool {
        self.w.is_some()
    }

    /// Computes the interpolated velocity vector [m/s] at the given
    /// fractional grid indices, or `None` if any required component is
    /// undefined there.
    pub fn sample(&self, indices: &FracIdx3<F>) -> Option<Vec3<F>> {
        let u = self.u.sample(indices)?;
        let v = self.v.sample(indices)?;
        let w = match &self.w {
            Some(field) => field.sample(indices)?,
            None => F::zero(),
        };
        Some(Vec3::new(u, v, w))
    }
}

/// An ordered series of velocity fields at increasing points in time.
///
/// A single snapshot is the degenerate case and is sampled at any time;
/// a longer series is linearly interpolated between the two snapshots
/// bracketing the sample time. Whether a field can be sampled at an
/// arbitrary time is thus a property of the data, not of a type.
#[derive(Clone, Debug)]
pub struct VelocitySeries<F, H> {
    times: Vec<F>,
    fields: Vec<VelocityField<F, H>>,
}

impl<F, H> VelocitySeries<F, H>
where
    F: PFloat,
    H: HorGrid<F>,
{
    /// Creates a new series from snapshot times and the corresponding
    /// velocity fields.
    pub fn new(times: Vec<F>, fields: Vec<VelocityField<F, H>>) -> Self {
        assert_eq!(
            times.len(),
            fields.len(),
            "Number of snapshot times and velocity fields must be equal"
        );
        assert!(!fields.is_empty(), "Velocity series cannot be empty");
        assert!(
            times.windows(2).all(|pair| pair[0] < pair[1]),
            "Snapshot times must be strictly increasing"
        );
        Self { times, fields }
    }

    /// Creates a steady (time-independent) series from a single field.
    pub fn steady(field: VelocityField<F, H>) -> Self {
        Self {
            times: vec![F::zero()],
            fields: vec![field],
        }
    }

    /// Returns the snapshot times of the series.
    pub fn times(&self) -> &[F] {
        &self.times
    }

    /// Whether every snapshot in the series carries a vertical
    /// velocity component.
    pub fn has_vertical(&self) -> bool {
        self.fields.iter().all(VelocityField::has_vertical)
    }

    /// Resolves which snapshot(s) apply for sampling around the given
    /// time. Times outside the series range use the nearest snapshot.
    pub fn resolve(&self, time: F) -> ResolvedVelocity<'_, F, H> {
        let n = self.fields.len();
        if n == 1 || time <= self.times[0] {
            return ResolvedVelocity::Steady(&self.fields[0]);
        }
        if time >= self.times[n - 1] {
            return ResolvedVelocity::Steady(&self.fields[n - 1]);
        }
        let upper = self.times.partition_point(|&t| t <= time).min(n - 1);
        let lower = upper - 1;
        ResolvedVelocity::Blended {
            first: &self.fields[lower],
            second: &self.fields[upper],
            first_time: self.times[lower],
            second_time: self.times[upper],
        }
    }
}

/// The velocity snapshot(s) resolved for one integration interval.
#[derive(Clone, Debug)]
pub enum ResolvedVelocity<'a, F, H> {
    /// A single applicable snapshot.
    Steady(&'a VelocityField<F, H>),
    /// Two bracketing snapshots, interpolated linearly in time.
    Blended {
        first: &'a VelocityField<F, H>,
        second: &'a VelocityField<F, H>,
        first_time: F,
        second_time: F,
    },
}

impl<F, H> ResolvedVelocity<'_, F, H>
where
    F: PFloat,
    H: HorGrid<F>,
{
    /// Computes the interpolated velocity vector [m/s] at the given
    /// fractional grid indices and time.
    pub fn sample(&self, indices: &FracIdx3<F>, time: F) -> Option<Vec3<F>> {
        match self {
            Self::Steady(field) => field.sample(indices),
            Self::Blended {
                first,
                second,
                first_time,
                second_time,
            } => {
                let first_sample = first.sample(indices)?;
                let second_sample = second.sample(indices)?;
                let fraction = ((time - *first_time) / (*second_time - *first_time))
                    .max(F::zero())
                    .min(F::one());
                Some(&first_sample * (F::one() - fraction) + &second_sample * fraction)
            }
        }
    }
}

/// Converts a physical velocity [m/s] at the given latitude into rates
/// of change of (longitude [deg], latitude [deg], depth [m]).
///
/// Zonal displacement shrinks with the latitude cosine; a zero zonal
/// velocity maps to a zero longitude rate even at the poles, where the
/// metric is singular.
pub fn coordinate_rates<F: PFloat>(velocity: &Vec3<F>, lat: F) -> Vec3<F> {
    use Dim3::{X, Y, Z};
    let deg_to_rad = F::from_f64(constants::DEG_TO_RAD).unwrap();
    let meters_per_degree = F::from_f64(constants::EARTH_RADIUS).unwrap() * deg_to_rad;
    let cos_lat = (lat * deg_to_rad).cos();

    let dlon = if velocity[X] == F::zero() {
        F::zero()
    } else {
        velocity[X] / (meters_per_degree * cos_lat)
    };
    let dlat = velocity[Y] / meters_per_degree;
    Vec3::new(dlon, dlat, velocity[Z])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{latlon::LatLonGrid, MonotonicAxis};
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    fn surface_grid() -> Arc<ModelGrid<f64, LatLonGrid<f64>>> {
        Arc::new(ModelGrid::new(LatLonGrid::global(30.0), None))
    }

    fn depth_grid() -> Arc<ModelGrid<f64, LatLonGrid<f64>>> {
        Arc::new(ModelGrid::new(
            LatLonGrid::global(30.0),
            Some(MonotonicAxis::from_edges(&[-400.0, -200.0, -100.0, 0.0])),
        ))
    }

    #[test]
    fn sampling_reproduces_linear_fields() {
        let grid = surface_grid();
        // Value equals the x node index at cell centers.
        let values = Array3::from_shape_fn((12, 6, 1), |(i, _, _)| i as f64);
        let field = ScalarField3::centered("idx".to_string(), grid, values);

        // Halfway between the centers of cells 3 and 4.
        let sample = field.sample(&FracIdx3::new(4.0, 3.5, 0.0)).unwrap();
        assert_abs_diff_eq!(sample, 3.5, epsilon = 1e-12);
    }

    #[test]
    fn lower_edge_staggering_shifts_the_sample_points() {
        let grid = surface_grid();
        let values = Array3::from_shape_fn((12, 6, 1), |(i, _, _)| i as f64);
        let field = ScalarField3::new(
            "u".to_string(),
            grid,
            In3D::new(
                CoordLocation::LowerEdge,
                CoordLocation::Center,
                CoordLocation::Center,
            ),
            values,
        );

        // At index 4.0 the position is exactly on the face holding value 4.
        let sample = field.sample(&FracIdx3::new(4.0, 3.5, 0.0)).unwrap();
        assert_abs_diff_eq!(sample, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn periodic_sampling_wraps_node_lookup() {
        let grid = surface_grid();
        let values = Array3::from_shape_fn((12, 6, 1), |(i, _, _)| i as f64);
        let field = ScalarField3::centered("idx".to_string(), grid, values);

        // Between the last cell center (value 11) and the first (value 0),
        // with three quarters of the weight on the last.
        let sample = field.sample(&FracIdx3::new(11.75, 3.0, 0.0)).unwrap();
        assert_abs_diff_eq!(sample, 11.0 * 0.75, epsilon = 1e-9);
    }

    #[test]
    fn nan_nodes_are_excluded_with_renormalized_weights() {
        let grid = surface_grid();
        let mut values = Array3::from_elem((12, 6, 1), 2.0);
        values[[4, 3, 0]] = f64::NAN;
        let field = ScalarField3::centered("masked".to_string(), grid.clone(), values);

        let sample = field.sample(&FracIdx3::new(4.2, 3.7, 0.0)).unwrap();
        assert_abs_diff_eq!(sample, 2.0, epsilon = 1e-12);

        let all_nan = Array3::from_elem((12, 6, 1), f64::NAN);
        let masked = ScalarField3::centered("land".to_string(), grid, all_nan);
        assert_eq!(masked.sample(&FracIdx3::new(4.2, 3.7, 0.0)), None);
    }

    #[test]
    fn two_dimensional_field_has_no_vertical_variation() {
        let grid = depth_grid();
        let values = Array3::from_elem((12, 6, 1), 7.5);
        let field = ScalarField3::centered("ssh".to_string(), grid, values);
        for &fk in &[0.0, 1.5, 3.0] {
            let sample = field.sample(&FracIdx3::new(4.0, 3.0, fk)).unwrap();
            assert_abs_diff_eq!(sample, 7.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn velocity_series_blends_between_snapshots() {
        let grid = surface_grid();
        let make_field = |speed: f64| {
            VelocityField::new(
                ScalarField3::centered(
                    "u".to_string(),
                    grid.clone(),
                    Array3::from_elem((12, 6, 1), speed),
                ),
                ScalarField3::centered(
                    "v".to_string(),
                    grid.clone(),
                    Array3::from_elem((12, 6, 1), 0.0),
                ),
                None,
            )
        };
        let series = VelocitySeries::new(vec![0.0, 100.0], vec![make_field(1.0), make_field(3.0)]);

        let resolved = series.resolve(50.0);
        let velocity = resolved
            .sample(&FracIdx3::new(6.0, 3.0, 0.0), 50.0)
            .unwrap();
        assert_abs_diff_eq!(velocity[Dim3::X], 2.0, epsilon = 1e-12);

        // Outside the series range the nearest snapshot applies.
        let early = series.resolve(-10.0);
        let velocity = early.sample(&FracIdx3::new(6.0, 3.0, 0.0), -10.0).unwrap();
        assert_abs_diff_eq!(velocity[Dim3::X], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn coordinate_rates_account_for_latitude_cosine() {
        let velocity = Vec3::new(1.0, 1.0, 0.01);
        let rates_equator = coordinate_rates(&velocity, 0.0);
        let rates_60n = coordinate_rates(&velocity, 60.0);
        assert_abs_diff_eq!(
            rates_60n[Dim3::X],
            rates_equator[Dim3::X] * 2.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(rates_60n[Dim3::Y], rates_equator[Dim3::Y]);
        assert_abs_diff_eq!(rates_60n[Dim3::Z], 0.01);

        // No zonal motion means no longitude change, even at the pole.
        let still = coordinate_rates(&Vec3::new(0.0, 0.0, 0.0), 90.0);
        assert_eq!(still, Vec3::zero());
    }
}
