//! Error types for grid geometry and drift configuration.

use std::error::Error;
use std::fmt;

/// Errors in the configuration of a drift run.
///
/// All configuration errors are raised before any particle state is
/// mutated, so a failed call leaves the batch untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The initial position/time arrays do not all have the same length.
    MismatchedArrayLengths {
        lons: usize,
        lats: usize,
        depths: usize,
        times: usize,
    },
    /// A named field was requested that is not registered with the batch.
    UnknownField {
        /// Name of the missing field.
        name: String,
    },
    /// Vertical particle motion was requested but the velocity series
    /// carries no vertical component.
    MissingVerticalVelocity,
    /// No output times were supplied, so there is nothing to integrate towards.
    NoOutputTimes,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MismatchedArrayLengths {
                lons,
                lats,
                depths,
                times,
            } => write!(
                f,
                "initial arrays must have equal lengths (lon: {lons}, lat: {lats}, depth: {depths}, time: {times})"
            ),
            Self::UnknownField { name } => write!(f, "unknown field '{name}'"),
            Self::MissingVerticalVelocity => {
                write!(f, "vertical motion requested but no vertical velocity component given")
            }
            Self::NoOutputTimes => write!(f, "at least one output time is required"),
        }
    }
}

impl Error for ConfigError {}

/// Errors in the local geometry of a curvilinear grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeometryError {
    /// The quadrilateral cell is degenerate, so the local bilinear map
    /// cannot be inverted.
    DegenerateCell {
        /// Index of the cell along the x-axis.
        i: usize,
        /// Index of the cell along the y-axis.
        j: usize,
    },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateCell { i, j } => {
                write!(f, "degenerate grid cell ({i}, {j}) defeats local inversion")
            }
        }
    }
}

impl Error for GeometryError {}
