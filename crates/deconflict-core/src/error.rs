//! Error types for trajectory construction and detection.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeconflictError {
    #[error("coordinate {axis} is not finite: {value}")]
    NonFiniteCoordinate { axis: char, value: f64 },

    #[error("invalid waypoint time: {0}")]
    InvalidTime(String),

    #[error("buffer must be a finite, non-negative distance (got {0})")]
    InvalidBuffer(f64),
}

pub type Result<T> = std::result::Result<T, DeconflictError>;
