//! End-to-end advection tests on small analytic grids and fields.

use approx::assert_abs_diff_eq;
use ndarray::{Array2, Array3};
use pelorus::{
    constants,
    drift::{
        stepping::Rk4Stepper, DriftOptions, DrifterSet, DrifterStatus,
    },
    field::{ScalarField3, VelocityField, VelocitySeries},
    grid::{
        curvilinear::CurvilinearGrid, latlon::LatLonGrid, HorGrid, ModelGrid, MonotonicAxis,
    },
};
use std::sync::Arc;

/// Degrees of longitude per second of 1 m/s zonal flow at the equator.
fn deg_per_second() -> f64 {
    1.0 / (constants::EARTH_RADIUS * constants::DEG_TO_RAD)
}

fn uniform_field<H: HorGrid<f64>>(
    grid: &Arc<ModelGrid<f64, H>>,
    u: f64,
    v: f64,
) -> VelocityField<f64, H> {
    let (nx, ny) = grid.horizontal().shape();
    VelocityField::new(
        ScalarField3::centered(
            "u".to_string(),
            grid.clone(),
            Array3::from_elem((nx, ny, 1), u),
        ),
        ScalarField3::centered(
            "v".to_string(),
            grid.clone(),
            Array3::from_elem((nx, ny, 1), v),
        ),
        None,
    )
}

#[test]
fn zero_velocity_leaves_drifters_exactly_in_place() {
    let grid = Arc::new(ModelGrid::new(LatLonGrid::global(4.0), None));
    let series = VelocitySeries::steady(uniform_field(&grid, 0.0, 0.0));
    let mut set = DrifterSet::new(
        vec![0.0],
        vec![0.0],
        vec![0.0],
        vec![0.0],
        grid,
        series,
    )
    .unwrap();

    let (stop_times, snapshots) = set
        .integrate_to_times(
            &Rk4Stepper::new(),
            &[0.0, 100.0],
            &[],
            None,
            &DriftOptions::default(),
        )
        .unwrap();

    assert_eq!(stop_times, vec![0.0, 100.0]);
    for snapshot in &snapshots {
        assert_eq!(snapshot.lons()[0], 0.0);
        assert_eq!(snapshot.lats()[0], 0.0);
        assert_eq!(snapshot.statuses()[0], DrifterStatus::Active);
    }
    assert_eq!(snapshots[1].times()[0], 100.0);
}

#[test]
fn eastward_flow_wraps_across_the_periodic_boundary() {
    let grid = Arc::new(ModelGrid::new(LatLonGrid::global(4.0), None));
    let series = VelocitySeries::steady(uniform_field(&grid, 1.0, 0.0));
    let mut set = DrifterSet::new(
        vec![179.9],
        vec![0.0],
        vec![0.0],
        vec![0.0],
        grid,
        series,
    )
    .unwrap();

    let duration = 25_000.0;
    let (stop_times, snapshots) = set
        .integrate_to_times(
            &Rk4Stepper::new(),
            &[duration],
            &[],
            None,
            &DriftOptions::default(),
        )
        .unwrap();

    assert_eq!(stop_times, vec![0.0, duration]);
    let expected = 179.9 + duration * deg_per_second() - 360.0;
    let lon = snapshots[1].lons()[0];
    assert!(lon >= -180.0 && lon < 180.0);
    assert_abs_diff_eq!(lon, expected, epsilon = 1e-6);
    assert_eq!(snapshots[1].statuses()[0], DrifterStatus::Active);
}

#[test]
fn northward_flow_exits_a_bounded_grid_and_freezes_the_drifter() {
    let grid = Arc::new(ModelGrid::new(
        LatLonGrid::new(
            MonotonicAxis::regular(60, -30.0, 30.0),
            MonotonicAxis::regular(35, -75.0, -40.0),
        ),
        None,
    ));
    let series = VelocitySeries::steady(uniform_field(&grid, 0.0, 1.0));
    let mut set = DrifterSet::new(
        vec![0.0],
        vec![-41.0],
        vec![0.0],
        vec![0.0],
        grid,
        series,
    )
    .unwrap();

    // The drifter needs roughly 111 km / (1 m/s) to reach the northern
    // boundary, so it is still inside at the first stop and gone at the
    // second.
    let (_, snapshots) = set
        .integrate_to_times(
            &Rk4Stepper::new(),
            &[60_000.0, 200_000.0],
            &[],
            None,
            &DriftOptions::default(),
        )
        .unwrap();

    assert_eq!(snapshots[1].statuses()[0], DrifterStatus::Active);
    assert_abs_diff_eq!(
        snapshots[1].lats()[0],
        -41.0 + 60_000.0 * deg_per_second(),
        epsilon = 1e-6
    );

    assert_eq!(snapshots[2].statuses()[0], DrifterStatus::OutOfDomain);
    // Frozen at the last valid state, not at the exit stop.
    assert_eq!(snapshots[2].lats()[0], snapshots[1].lats()[0]);
    assert_eq!(snapshots[2].times()[0], 60_000.0);
}

#[test]
fn snapshot_count_equals_distinct_union_of_output_and_refresh_times() {
    let grid = Arc::new(ModelGrid::new(LatLonGrid::global(4.0), None));
    let series = VelocitySeries::steady(uniform_field(&grid, 0.05, 0.0));
    let mut set = DrifterSet::new(
        vec![0.0, 10.0, 20.0],
        vec![0.0, 5.0, -5.0],
        vec![0.0, 0.0, 0.0],
        vec![0.0, 0.0, 0.0],
        grid,
        series,
    )
    .unwrap();

    // Duplicates within and across the two time lists collapse to one
    // stop each.
    let (stop_times, snapshots) = set
        .integrate_to_times(
            &Rk4Stepper::new(),
            &[0.0, 600.0, 600.0, 1200.0, 1800.0],
            &[300.0, 900.0, 1200.0, 1500.0],
            None,
            &DriftOptions::default(),
        )
        .unwrap();

    assert_eq!(
        stop_times,
        vec![0.0, 300.0, 600.0, 900.0, 1200.0, 1500.0, 1800.0]
    );
    assert_eq!(snapshots.len(), 7);
    assert!(snapshots.iter().all(|snapshot| snapshot.len() == 3));
}

#[test]
fn linear_velocity_ramp_is_integrated_exactly() {
    let grid = Arc::new(ModelGrid::new(LatLonGrid::global(4.0), None));
    let duration = 40_000.0;
    let series = VelocitySeries::new(
        vec![0.0, duration],
        vec![uniform_field(&grid, 0.0, 0.0), uniform_field(&grid, 1.0, 0.0)],
    );
    let mut set = DrifterSet::new(
        vec![0.0],
        vec![0.0],
        vec![0.0],
        vec![0.0],
        grid,
        series,
    )
    .unwrap();

    let (_, snapshots) = set
        .integrate_to_times(
            &Rk4Stepper::new(),
            &[duration],
            &[],
            None,
            &DriftOptions::default(),
        )
        .unwrap();

    // The classic Runge-Kutta scheme integrates a velocity linear in
    // time without truncation error.
    let expected = 0.5 * duration * deg_per_second();
    assert_abs_diff_eq!(snapshots[1].lons()[0], expected, epsilon = 1e-9);
}

#[test]
fn undefined_velocity_over_masked_cells_exits_the_drifter() {
    let grid = Arc::new(ModelGrid::new(LatLonGrid::global(4.0), None));
    let (nx, ny) = grid.horizontal().shape();
    // Land mask covering the eastern hemisphere.
    let masked = Array3::from_shape_fn((nx, ny, 1), |(i, _, _)| {
        if i >= nx / 2 {
            f64::NAN
        } else {
            1.0
        }
    });
    let series = VelocitySeries::steady(VelocityField::new(
        ScalarField3::centered("u".to_string(), grid.clone(), masked.clone()),
        ScalarField3::centered("v".to_string(), grid.clone(), masked),
        None,
    ));
    let mut set = DrifterSet::new(
        vec![90.0],
        vec![0.0],
        vec![0.0],
        vec![0.0],
        grid,
        series,
    )
    .unwrap();

    let (_, snapshots) = set
        .integrate_to_times(
            &Rk4Stepper::new(),
            &[1000.0],
            &[],
            None,
            &DriftOptions::default(),
        )
        .unwrap();

    assert_eq!(snapshots[1].statuses()[0], DrifterStatus::OutOfDomain);
    assert_eq!(snapshots[1].lons()[0], 90.0);
    assert_eq!(snapshots[1].times()[0], 0.0);
}

#[test]
fn drifters_follow_uniform_flow_on_a_curvilinear_grid() {
    let n = 21;
    let node_lons =
        Array2::from_shape_fn((n, n), |(i, j)| -20.0 + 2.0 * i as f64 + 0.4 * j as f64);
    let node_lats = Array2::from_shape_fn((n, n), |(_, j)| 20.0 + 2.0 * j as f64);
    let grid = Arc::new(ModelGrid::new(
        CurvilinearGrid::from_nodes(node_lons, node_lats),
        None,
    ));
    let series = VelocitySeries::steady(uniform_field(&grid, 0.0, 1.0));
    let mut set = DrifterSet::new(
        vec![0.0],
        vec![30.0],
        vec![0.0],
        vec![0.0],
        grid,
        series,
    )
    .unwrap();

    let duration = 100_000.0;
    let (_, snapshots) = set
        .integrate_to_times(
            &Rk4Stepper::with_max_substep(10_000.0),
            &[duration],
            &[],
            None,
            &DriftOptions::default(),
        )
        .unwrap();

    assert_eq!(snapshots[1].statuses()[0], DrifterStatus::Active);
    assert_abs_diff_eq!(
        snapshots[1].lats()[0],
        30.0 + duration * deg_per_second(),
        epsilon = 1e-6
    );
    assert_abs_diff_eq!(snapshots[1].lons()[0], 0.0, epsilon = 1e-6);
}

#[test]
fn backward_output_times_integrate_backwards() {
    let grid = Arc::new(ModelGrid::new(LatLonGrid::global(4.0), None));
    let series = VelocitySeries::steady(uniform_field(&grid, 1.0, 0.0));
    let mut set = DrifterSet::new(
        vec![0.0],
        vec![0.0],
        vec![0.0],
        vec![50_000.0],
        grid,
        series,
    )
    .unwrap();

    let (stop_times, snapshots) = set
        .integrate_to_times(
            &Rk4Stepper::new(),
            &[25_000.0, 0.0],
            &[],
            None,
            &DriftOptions::default(),
        )
        .unwrap();

    assert_eq!(stop_times, vec![50_000.0, 25_000.0, 0.0]);
    assert_abs_diff_eq!(
        snapshots[1].lons()[0],
        -25_000.0 * deg_per_second(),
        epsilon = 1e-6
    );
    assert_abs_diff_eq!(
        snapshots[2].lons()[0],
        -50_000.0 * deg_per_second(),
        epsilon = 1e-6
    );
}
