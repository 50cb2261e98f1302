//! The `pelorus` crate provides tools for tracing drifting particles
//! through velocity fields sampled on gridded ocean-model output.
pub mod constants;
pub mod drift;
pub mod error;
pub mod field;
pub mod geometry;
pub mod grid;
pub mod num;
