//! Time stepping schemes for advancing drifters through one interval.

use crate::{
    field::{coordinate_rates, ResolvedVelocity},
    geometry::{Dim3, Point3, Vec3},
    grid::{HorGrid, ModelGrid},
    num::PFloat,
};

/// The outcome of advancing one particle over one interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The particle reached the end of the interval.
    Advanced,
    /// The particle left the valid domain or hit an undefined velocity
    /// sample; it must not be advanced further.
    Exited,
}

/// Evaluates the coordinate-space rate of change (degrees and meters
/// per unit time) at the given position and time.
///
/// The position is wrapped across periodic boundaries in place. Returns
/// `None` if the position is outside the grid, its cell geometry is
/// degenerate, or the velocity sample is undefined there.
pub fn evaluate_rates<F, H>(
    position: &mut Point3<F>,
    time: F,
    grid: &ModelGrid<F, H>,
    velocity: &ResolvedVelocity<'_, F, H>,
) -> Option<Vec3<F>>
where
    F: PFloat,
    H: HorGrid<F>,
{
    let query = grid.locate(position, false).ok()?;
    let indices = query.unwrap_and_update_coord(position)?;
    let sampled = velocity.sample(&indices, time)?;
    Some(coordinate_rates(&sampled, position[Dim3::Y]))
}

/// Defines a method for advancing drifters over one schedule interval.
///
/// Each stage of a step re-interpolates the velocity field at the
/// stage position and time.
pub trait DriftStepper: Sync {
    fn advance<F, H>(
        &self,
        position: &mut Point3<F>,
        start_time: F,
        end_time: F,
        grid: &ModelGrid<F, H>,
        velocity: &ResolvedVelocity<'_, F, H>,
    ) -> StepOutcome
    where
        F: PFloat,
        H: HorGrid<F>;
}

/// Classic fixed-step fourth-order Runge-Kutta advance.
#[derive(Clone, Copy, Debug)]
pub struct Rk4Stepper {
    max_substep: Option<f64>,
}

impl Rk4Stepper {
    /// Creates a stepper taking a single step per schedule interval.
    pub fn new() -> Self {
        Self { max_substep: None }
    }

    /// Creates a stepper splitting each interval into substeps no
    /// longer than the given duration.
    pub fn with_max_substep(max_substep: f64) -> Self {
        assert!(
            max_substep > 0.0,
            "Maximum substep duration must be positive"
        );
        Self {
            max_substep: Some(max_substep),
        }
    }

    fn n_substeps<F: PFloat>(&self, span: F) -> usize {
        match self.max_substep {
            Some(max_substep) => {
                let max_substep = F::from_f64(max_substep).unwrap();
                (span.abs() / max_substep)
                    .ceil()
                    .to_usize()
                    .unwrap_or(1)
                    .max(1)
            }
            None => 1,
        }
    }
}

impl Default for Rk4Stepper {
    fn default() -> Self {
        Self::new()
    }
}

impl DriftStepper for Rk4Stepper {
    fn advance<F, H>(
        &self,
        position: &mut Point3<F>,
        start_time: F,
        end_time: F,
        grid: &ModelGrid<F, H>,
        velocity: &ResolvedVelocity<'_, F, H>,
    ) -> StepOutcome
    where
        F: PFloat,
        H: HorGrid<F>,
    {
        let span = end_time - start_time;
        let n_substeps = self.n_substeps(span);
        let step = span / F::from_usize(n_substeps).unwrap();
        let half = F::from_f64(0.5).unwrap();
        let two = F::from_f64(2.0).unwrap();
        let sixth = F::from_f64(1.0 / 6.0).unwrap();

        for substep in 0..n_substeps {
            let time = start_time + F::from_usize(substep).unwrap() * step;
            let half_step = step * half;

            let k1 = match evaluate_rates(position, time, grid, velocity) {
                Some(rates) => rates,
                None => return StepOutcome::Exited,
            };
            let mut stage = &*position + &k1 * half_step;
            let k2 = match evaluate_rates(&mut stage, time + half_step, grid, velocity) {
                Some(rates) => rates,
                None => return StepOutcome::Exited,
            };
            let mut stage = &*position + &k2 * half_step;
            let k3 = match evaluate_rates(&mut stage, time + half_step, grid, velocity) {
                Some(rates) => rates,
                None => return StepOutcome::Exited,
            };
            let mut stage = &*position + &k3 * step;
            let k4 = match evaluate_rates(&mut stage, time + step, grid, velocity) {
                Some(rates) => rates,
                None => return StepOutcome::Exited,
            };

            let weighted = &(&k2 + &k3) * two;
            let increment = &(&(&k1 + &k4) + &weighted) * (step * sixth);
            *position = &*position + increment;
        }
        StepOutcome::Advanced
    }
}

/// Heun (predictor-corrector) advance, a cheaper second-order scheme.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeunStepper;

impl DriftStepper for HeunStepper {
    fn advance<F, H>(
        &self,
        position: &mut Point3<F>,
        start_time: F,
        end_time: F,
        grid: &ModelGrid<F, H>,
        velocity: &ResolvedVelocity<'_, F, H>,
    ) -> StepOutcome
    where
        F: PFloat,
        H: HorGrid<F>,
    {
        let step = end_time - start_time;
        let half = F::from_f64(0.5).unwrap();

        let initial_rates = match evaluate_rates(position, start_time, grid, velocity) {
            Some(rates) => rates,
            None => return StepOutcome::Exited,
        };
        let mut predicted = &*position + &initial_rates * step;
        match evaluate_rates(&mut predicted, end_time, grid, velocity) {
            Some(predicted_rates) => {
                *position = &*position + (&initial_rates + &predicted_rates) * (half * step);
                StepOutcome::Advanced
            }
            None => StepOutcome::Exited,
        }
    }
}
