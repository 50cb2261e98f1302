//! Physical constants and numeric tolerances.

/// Mean radius of the Earth [m].
pub const EARTH_RADIUS: f64 = 6.371e6;

/// Factor for converting degrees to radians.
pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// Number of degrees in a full longitude circle.
pub const FULL_CIRCLE_DEG: f64 = 360.0;

/// Relative tolerance on the longitude span when detecting a periodic axis.
pub const PERIODIC_SPAN_TOLERANCE: f64 = 1e-4;

/// Convergence tolerance (in fractional cell units) for the local
/// inversion of curvilinear grid cells.
pub const CURVILINEAR_INVERSION_TOLERANCE: f64 = 1e-10;

/// Maximum number of Newton iterations when inverting a curvilinear cell.
pub const CURVILINEAR_INVERSION_MAX_ITERATIONS: usize = 16;

/// Maximum number of neighboring cells to walk through when the local
/// inversion lands outside the initial guess cell.
pub const CURVILINEAR_MAX_CELL_MOVES: usize = 32;
