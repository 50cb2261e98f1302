//! Schedules of output and field-refresh stops for a drift run.

use crate::{error::ConfigError, num::PFloat};
use std::cmp::Ordering;

/// Direction of integration in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// One stop in the schedule: a time at which the integrator must emit
/// output, refresh its velocity resolution, or both.
#[derive(Clone, Debug, PartialEq)]
pub struct Stop<F> {
    /// The time of the stop.
    pub time: F,
    /// Whether a snapshot is due at this stop.
    pub is_output: bool,
    /// Whether the velocity resolution must be refreshed at this stop.
    pub is_refresh: bool,
}

/// The sorted, duplicate-free union of caller output times and field
/// refresh times.
///
/// The first stop always equals the batch's initial time and is marked
/// as a refresh stop, since the first interval needs a velocity
/// resolution. The sequence is strictly monotonic in the direction of
/// integration.
#[derive(Clone, Debug)]
pub struct StopSchedule<F> {
    stops: Vec<Stop<F>>,
    direction: Direction,
}

impl<F: PFloat> StopSchedule<F> {
    /// Builds the schedule for a run starting at the given time.
    ///
    /// The direction is inferred from whether the final output time
    /// lies after or before the start; stops strictly behind the start
    /// in that direction are unreachable and dropped.
    pub fn build(start: F, output_times: &[F], refresh_times: &[F]) -> Result<Self, ConfigError> {
        let final_output = match output_times.last() {
            Some(&time) => time,
            None => return Err(ConfigError::NoOutputTimes),
        };
        let direction = if final_output >= start {
            Direction::Forward
        } else {
            Direction::Backward
        };
        let reachable = |time: F| match direction {
            Direction::Forward => time >= start,
            Direction::Backward => time <= start,
        };

        let mut stops = vec![Stop {
            time: start,
            is_output: false,
            is_refresh: true,
        }];
        stops.extend(
            output_times
                .iter()
                .filter(|&&time| reachable(time))
                .map(|&time| Stop {
                    time,
                    is_output: true,
                    is_refresh: false,
                }),
        );
        stops.extend(
            refresh_times
                .iter()
                .filter(|&&time| reachable(time))
                .map(|&time| Stop {
                    time,
                    is_output: false,
                    is_refresh: true,
                }),
        );

        stops.sort_by(|a, b| {
            let ordering = a
                .time
                .partial_cmp(&b.time)
                .expect("NaN in stop time comparison");
            match direction {
                Direction::Forward => ordering,
                Direction::Backward => ordering.reverse(),
            }
        });

        let mut merged: Vec<Stop<F>> = Vec::with_capacity(stops.len());
        for stop in stops {
            match merged.last_mut() {
                Some(last) if last.time.partial_cmp(&stop.time) == Some(Ordering::Equal) => {
                    last.is_output |= stop.is_output;
                    last.is_refresh |= stop.is_refresh;
                }
                _ => merged.push(stop),
            }
        }

        Ok(Self {
            stops: merged,
            direction,
        })
    }

    /// Returns the ordered stops, beginning with the start time.
    pub fn stops(&self) -> &[Stop<F>] {
        &self.stops
    }

    /// Returns the direction of integration.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the number of stops at which a snapshot is due.
    pub fn n_output_stops(&self) -> usize {
        self.stops.iter().filter(|stop| stop.is_output).count()
    }
}
