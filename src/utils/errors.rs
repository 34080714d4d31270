use std::fmt;
use std::error::Error;

use crate::scheduler::Phase;

/// Represents errors that can occur while configuring or advancing a flock.
#[derive(Debug, Clone, PartialEq)]
pub enum FlockError {
    /// Indicates a rejected configuration value (e.g., negative bounds or a non-finite weight).
    InvalidConfiguration(String),
    /// Indicates that a backing buffer or worker could not be allocated.
    ResourceExhaustion(String),
    /// Indicates that a worker panicked while executing one of the update phases.
    WorkerFault {
        worker: usize,
        phase: Phase,
        message: String,
    },
    /// Indicates that grid membership disagrees with the agents' recorded cells.
    InvariantViolation(String),
}

impl FlockError {
    /// Builds an `InvalidConfiguration` error for a value that must be finite and non-negative.
    pub(crate) fn invalid(name: &str, value: f64) -> Self {
        FlockError::InvalidConfiguration(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        ))
    }
}

impl fmt::Display for FlockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FlockError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            FlockError::ResourceExhaustion(msg) => write!(f, "Resource exhaustion: {}", msg),
            FlockError::WorkerFault { worker, phase, message } => {
                write!(f, "Worker {} faulted during {} phase: {}", worker, phase, message)
            }
            FlockError::InvariantViolation(msg) => write!(f, "Invariant violation: {}", msg),
        }
    }
}

impl Error for FlockError {}
