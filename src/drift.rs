//! Lagrangian drifter batches advected through a velocity series.

pub mod schedule;
pub mod stepping;

use crate::{
    error::ConfigError,
    field::{ScalarField3, VelocitySeries},
    geometry::{Dim3, Point3},
    grid::{HorGrid, ModelGrid},
    num::PFloat,
};
use rayon::prelude::*;
use self::schedule::StopSchedule;
use self::stepping::{DriftStepper, StepOutcome};
use std::sync::Arc;

/// Whether to print status messages while integrating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbose {
    No,
    Yes,
}

impl Verbose {
    pub fn is_yes(&self) -> bool {
        *self == Self::Yes
    }
}

/// The lifecycle state of one drifter.
///
/// Transitions are one-way: an `Excluded` or `OutOfDomain` drifter is
/// frozen at its last valid state and never advanced again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum DrifterStatus {
    /// The drifter is advected normally.
    Active,
    /// The inclusion predicate rejected the drifter.
    Excluded,
    /// The drifter left the valid domain or hit an undefined velocity
    /// sample.
    OutOfDomain,
}

/// The recorded state of every drifter at one output stop.
///
/// Snapshots are rectangular: frozen drifters carry their last valid
/// position and time forward, with their status telling them apart.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct DriftSnapshot<F> {
    time: F,
    lons: Vec<F>,
    lats: Vec<F>,
    depths: Vec<F>,
    times: Vec<F>,
    statuses: Vec<DrifterStatus>,
}

impl<F: PFloat> DriftSnapshot<F> {
    /// Returns the stop time the snapshot was emitted at.
    pub fn time(&self) -> F {
        self.time
    }

    /// Returns the number of drifters in the snapshot.
    pub fn len(&self) -> usize {
        self.lons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lons.is_empty()
    }

    /// Returns the longitudes [deg] of all drifters.
    pub fn lons(&self) -> &[F] {
        &self.lons
    }

    /// Returns the latitudes [deg] of all drifters.
    pub fn lats(&self) -> &[F] {
        &self.lats
    }

    /// Returns the depths [m] of all drifters.
    pub fn depths(&self) -> &[F] {
        &self.depths
    }

    /// Returns the per-drifter times, which lag the snapshot time for
    /// frozen drifters.
    pub fn times(&self) -> &[F] {
        &self.times
    }

    /// Returns the statuses of all drifters.
    pub fn statuses(&self) -> &[DrifterStatus] {
        &self.statuses
    }

    /// Returns the position of the drifter with the given index.
    pub fn position(&self, index: usize) -> Point3<F> {
        Point3::new(self.lons[index], self.lats[index], self.depths[index])
    }
}

/// Options controlling a drift integration.
#[derive(Clone, Copy, Debug)]
pub struct DriftOptions {
    /// Emit snapshots at refresh-only stops as well as output stops, so
    /// the snapshot sequence covers every distinct schedule time. On by
    /// default; opt out for output-times-only sequences.
    pub emit_at_refresh: bool,
    /// Require a vertical velocity component so drifters move in depth.
    pub vertical_motion: bool,
    /// Accept nearest-node index estimates where degenerate cell
    /// geometry defeats exact inversion, instead of treating the
    /// drifter as out of domain.
    pub best_effort_geometry: bool,
}

impl Default for DriftOptions {
    fn default() -> Self {
        Self {
            emit_at_refresh: true,
            vertical_motion: false,
            best_effort_geometry: false,
        }
    }
}

/// A predicate selecting, per drifter, whether it remains in the run.
///
/// Evaluated once after every schedule interval; drifters mapped to
/// `false` are excluded permanently.
pub type InclusionPredicate<F, H> = dyn Fn(&DrifterSet<F, H>) -> Vec<bool> + Sync;

/// A batch of massless drifters sharing one grid and velocity series.
///
/// State is stored as one vector per quantity, with index-based
/// accessors for individual drifters.
#[derive(Clone, Debug)]
pub struct DrifterSet<F, H> {
    lons: Vec<F>,
    lats: Vec<F>,
    depths: Vec<F>,
    times: Vec<F>,
    statuses: Vec<DrifterStatus>,
    grid: Arc<ModelGrid<F, H>>,
    velocities: VelocitySeries<F, H>,
    scalars: Vec<ScalarField3<F, H>>,
    verbose: Verbose,
}

impl<F, H> DrifterSet<F, H>
where
    F: PFloat,
    H: HorGrid<F>,
{
    /// Creates a new batch from initial positions and times.
    ///
    /// All arrays must have the same length. A NaN depth means "at the
    /// surface" and is replaced by zero.
    pub fn new(
        lons: Vec<F>,
        lats: Vec<F>,
        depths: Vec<F>,
        times: Vec<F>,
        grid: Arc<ModelGrid<F, H>>,
        velocities: VelocitySeries<F, H>,
    ) -> Result<Self, ConfigError> {
        let n = lons.len();
        if lats.len() != n || depths.len() != n || times.len() != n {
            return Err(ConfigError::MismatchedArrayLengths {
                lons: lons.len(),
                lats: lats.len(),
                depths: depths.len(),
                times: times.len(),
            });
        }
        let depths = depths
            .into_iter()
            .map(|depth| if depth.is_nan() { F::zero() } else { depth })
            .collect();
        Ok(Self {
            lons,
            lats,
            depths,
            times,
            statuses: vec![DrifterStatus::Active; n],
            grid,
            velocities,
            scalars: Vec::new(),
            verbose: Verbose::No,
        })
    }

    /// Registers a named scalar field for sampling along trajectories.
    pub fn with_scalar(mut self, field: ScalarField3<F, H>) -> Self {
        self.scalars.push(field);
        self
    }

    /// Sets the verbosity of subsequent integrations.
    pub fn with_verbose(mut self, verbose: Verbose) -> Self {
        self.verbose = verbose;
        self
    }

    /// Returns the number of drifters in the batch.
    pub fn len(&self) -> usize {
        self.lons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lons.is_empty()
    }

    /// Returns the number of drifters still being advected.
    pub fn n_active(&self) -> usize {
        self.statuses
            .iter()
            .filter(|&&status| status == DrifterStatus::Active)
            .count()
    }

    /// Returns the position of the drifter with the given index.
    pub fn position(&self, index: usize) -> Point3<F> {
        Point3::new(self.lons[index], self.lats[index], self.depths[index])
    }

    /// Returns the time of the drifter with the given index, which lags
    /// the batch for frozen drifters.
    pub fn time(&self, index: usize) -> F {
        self.times[index]
    }

    /// Returns the status of the drifter with the given index.
    pub fn status(&self, index: usize) -> DrifterStatus {
        self.statuses[index]
    }

    /// Returns the statuses of all drifters.
    pub fn statuses(&self) -> &[DrifterStatus] {
        &self.statuses
    }

    /// Returns a reference to the shared grid.
    pub fn grid(&self) -> &ModelGrid<F, H> {
        &self.grid
    }

    /// Samples the registered scalar field with the given name at the
    /// current drifter positions.
    ///
    /// Frozen drifters are sampled at their frozen positions. A value is
    /// `None` where the position falls outside the grid, its cell
    /// geometry is degenerate (unless `best_effort` accepts the
    /// nearest-node estimate), or every surrounding node is undefined.
    pub fn sample_scalar(
        &self,
        name: &str,
        best_effort: bool,
    ) -> Result<Vec<Option<F>>, ConfigError> {
        let field = self
            .scalars
            .iter()
            .find(|field| field.name() == name)
            .ok_or_else(|| ConfigError::UnknownField {
                name: name.to_string(),
            })?;
        Ok((0..self.len())
            .into_par_iter()
            .map(|index| {
                let mut position = self.position(index);
                let query = self.grid.locate(&position, best_effort).ok()?;
                let indices = query.unwrap_and_update_coord(&mut position)?;
                field.sample(&indices)
            })
            .collect())
    }

    /// Advects the batch through the schedule defined by the given
    /// output and refresh times, emitting a snapshot at every output
    /// stop.
    ///
    /// Returns the times of the emitted snapshots together with the
    /// snapshots themselves. The direction of integration is inferred
    /// from the final output time; configuration problems are reported
    /// before any drifter state changes.
    pub fn integrate_to_times<S: DriftStepper>(
        &mut self,
        stepper: &S,
        output_times: &[F],
        refresh_times: &[F],
        predicate: Option<&InclusionPredicate<F, H>>,
        options: &DriftOptions,
    ) -> Result<(Vec<F>, Vec<DriftSnapshot<F>>), ConfigError> {
        if options.vertical_motion && !self.velocities.has_vertical() {
            return Err(ConfigError::MissingVerticalVelocity);
        }
        let start = self.times.first().copied().unwrap_or_else(F::zero);
        let schedule = StopSchedule::build(start, output_times, refresh_times)?;

        let mut stop_times = Vec::with_capacity(schedule.n_output_stops());
        let mut snapshots = Vec::with_capacity(schedule.n_output_stops());

        let first = &schedule.stops()[0];
        if first.is_output || options.emit_at_refresh {
            stop_times.push(first.time);
            snapshots.push(self.snapshot(first.time));
        }

        let mut resolution_time = start;
        for window in 0..schedule.stops().len().saturating_sub(1) {
            let (current, next) = (&schedule.stops()[window], &schedule.stops()[window + 1]);
            if current.is_refresh {
                // Anchor the resolution inside the upcoming interval so
                // the bracketing snapshot pair is on the right side of
                // the refresh stop in either direction.
                resolution_time =
                    (current.time + next.time) * F::from_f64(0.5).unwrap();
            }
            if self.verbose.is_yes() {
                println!(
                    "Advancing {} of {} drifters from time {} to {}",
                    self.n_active(),
                    self.len(),
                    current.time,
                    next.time
                );
            }

            self.advance_interval(stepper, current.time, next.time, resolution_time, options);

            if let Some(predicate) = predicate {
                let included = predicate(self);
                assert_eq!(
                    included.len(),
                    self.len(),
                    "Inclusion predicate must produce one value per drifter"
                );
                for (status, keep) in self.statuses.iter_mut().zip(included) {
                    if *status == DrifterStatus::Active && !keep {
                        *status = DrifterStatus::Excluded;
                    }
                }
            }

            if next.is_output || options.emit_at_refresh {
                stop_times.push(next.time);
                snapshots.push(self.snapshot(next.time));
            }
        }
        Ok((stop_times, snapshots))
    }

    /// Advances all active drifters over one schedule interval and
    /// freezes those that leave the domain.
    fn advance_interval<S: DriftStepper>(
        &mut self,
        stepper: &S,
        start_time: F,
        end_time: F,
        resolution_time: F,
        options: &DriftOptions,
    ) {
        let updates: Vec<Option<(Point3<F>, bool)>> = {
            let resolved = self.velocities.resolve(resolution_time);
            (0..self.len())
                .into_par_iter()
                .map(|index| {
                    if self.statuses[index] != DrifterStatus::Active {
                        return None;
                    }
                    let mut position = self.position(index);
                    let outcome = stepper.advance(
                        &mut position,
                        start_time,
                        end_time,
                        &self.grid,
                        &resolved,
                    );
                    let in_domain = match outcome {
                        StepOutcome::Exited => false,
                        StepOutcome::Advanced => {
                            match self.grid.locate(&position, options.best_effort_geometry) {
                                Ok(query) => {
                                    query.unwrap_and_update_coord(&mut position).is_some()
                                }
                                Err(_) => false,
                            }
                        }
                    };
                    Some((position, in_domain))
                })
                .collect()
        };

        for (index, update) in updates.into_iter().enumerate() {
            if let Some((position, in_domain)) = update {
                if in_domain {
                    self.lons[index] = position[Dim3::X];
                    self.lats[index] = position[Dim3::Y];
                    self.depths[index] = position[Dim3::Z];
                    self.times[index] = end_time;
                } else {
                    // Frozen at the pre-step state.
                    self.statuses[index] = DrifterStatus::OutOfDomain;
                }
            }
        }
    }

    fn snapshot(&self, time: F) -> DriftSnapshot<F> {
        DriftSnapshot {
            time,
            lons: self.lons.clone(),
            lats: self.lats.clone(),
            depths: self.depths.clone(),
            times: self.times.clone(),
            statuses: self.statuses.clone(),
        }
    }
}
