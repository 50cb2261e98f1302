//! Rectilinear latitude-longitude horizontal grids.

use super::{GridQuery, HorGrid, MonotonicAxis, Topology};
use crate::{error::GeometryError, num::PFloat};

/// A horizontal grid whose longitude and latitude axes are independent
/// monotonic axes, so index location is a direct binary search per axis.
///
/// The longitude axis may be periodic; the latitude axis is always bounded.
#[derive(Clone, Debug)]
pub struct LatLonGrid<F> {
    lon_axis: MonotonicAxis<F>,
    lat_axis: MonotonicAxis<F>,
}

impl<F: PFloat> LatLonGrid<F> {
    /// Creates a new grid from the given longitude and latitude axes.
    ///
    /// The longitude axis is classified here: a full-circle span makes
    /// it periodic, so particles wrap around the dateline instead of
    /// leaving the domain.
    pub fn new(lon_axis: MonotonicAxis<F>, lat_axis: MonotonicAxis<F>) -> Self {
        let lon_axis = lon_axis.classify_as_longitude();
        assert_eq!(
            lat_axis.topology(),
            Topology::Bounded,
            "Latitude axis cannot be periodic"
        );
        Self { lon_axis, lat_axis }
    }

    /// Creates a regular global grid with the given cell extent in degrees.
    pub fn global(cell_extent_deg: F) -> Self {
        let full_circle = F::from_f64(crate::constants::FULL_CIRCLE_DEG).unwrap();
        let half_circle = full_circle / F::from_f64(2.0).unwrap();
        let quarter_circle = half_circle / F::from_f64(2.0).unwrap();
        let n_lon = (full_circle / cell_extent_deg).round().to_usize().unwrap();
        let n_lat = (half_circle / cell_extent_deg).round().to_usize().unwrap();
        Self::new(
            MonotonicAxis::regular(n_lon, -half_circle, half_circle),
            MonotonicAxis::regular(n_lat, -quarter_circle, quarter_circle),
        )
    }

    /// Returns a reference to the longitude axis.
    pub fn lon_axis(&self) -> &MonotonicAxis<F> {
        &self.lon_axis
    }

    /// Returns a reference to the latitude axis.
    pub fn lat_axis(&self) -> &MonotonicAxis<F> {
        &self.lat_axis
    }
}

impl<F: PFloat> HorGrid<F> for LatLonGrid<F> {
    fn shape(&self) -> (usize, usize) {
        (self.lon_axis.size(), self.lat_axis.size())
    }

    fn topology(&self) -> Topology {
        self.lon_axis.topology()
    }

    fn locate(
        &self,
        lon: F,
        lat: F,
        _best_effort: bool,
    ) -> Result<GridQuery<F, (F, F)>, GeometryError> {
        let fj = match self.lat_axis.fractional_index(lat) {
            GridQuery::Inside(index) => index,
            GridQuery::MovedInside(_) | GridQuery::Outside => return Ok(GridQuery::Outside),
        };
        Ok(match self.lon_axis.fractional_index(lon) {
            GridQuery::Inside(fi) => GridQuery::Inside((fi, fj)),
            GridQuery::MovedInside((fi, wrapped_lon)) => {
                GridQuery::MovedInside(((fi, fj), wrapped_lon))
            }
            GridQuery::Outside => GridQuery::Outside,
        })
    }

    fn position_at(&self, fi: F, fj: F) -> (F, F) {
        (self.lon_axis.coord_at(fi), self.lat_axis.coord_at(fj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unwrap_inside<F: PFloat>(query: GridQuery<F, (F, F)>) -> (F, F) {
        match query {
            GridQuery::Inside(indices) => indices,
            query => panic!("Unexpected query result {query:?}"),
        }
    }

    #[test]
    fn latlon_grid_index_search_works() {
        let grid = LatLonGrid::new(
            MonotonicAxis::regular(60, -30.0, 30.0),
            MonotonicAxis::regular(40, 20.0, 60.0),
        );
        assert_eq!(grid.topology(), Topology::Bounded);

        let (fi, fj) = unwrap_inside(grid.locate(-29.5, 20.5, false).unwrap());
        assert_abs_diff_eq!(fi, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(fj, 0.5, epsilon = 1e-12);

        assert_eq!(grid.locate(-30.5, 25.0, false).unwrap(), GridQuery::Outside);
        assert_eq!(grid.locate(0.0, 60.1, false).unwrap(), GridQuery::Outside);
    }

    #[test]
    fn periodic_grid_gives_same_index_for_wrapped_longitude() {
        let grid = LatLonGrid::global(4.0);
        assert_eq!(grid.topology(), Topology::XPeriodic);

        let (fi, fj) = unwrap_inside(grid.locate(12.3, -45.6, false).unwrap());
        match grid.locate(12.3 + 360.0, -45.6, false).unwrap() {
            GridQuery::MovedInside(((fi_wrapped, fj_wrapped), wrapped_lon)) => {
                assert_abs_diff_eq!(fi_wrapped, fi, epsilon = 1e-9);
                assert_abs_diff_eq!(fj_wrapped, fj, epsilon = 1e-9);
                assert_abs_diff_eq!(wrapped_lon, 12.3, epsilon = 1e-9);
            }
            query => panic!("Unexpected query result {query:?}"),
        }
    }

    #[test]
    fn locate_and_position_round_trip() {
        let grid = LatLonGrid::global(4.0);
        for &(lon, lat) in &[(-180.0, -90.0), (0.0, 0.0), (17.25, 33.5), (179.5, 89.9)] {
            let (fi, fj) = unwrap_inside(grid.locate(lon, lat, false).unwrap());
            let (lon_back, lat_back) = grid.position_at(fi, fj);
            assert_abs_diff_eq!(lon_back, lon, epsilon = 1e-9);
            assert_abs_diff_eq!(lat_back, lat, epsilon = 1e-9);
        }
    }
}
