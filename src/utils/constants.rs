use crate::utils;

/// Magnitude every boid's velocity is renormalized to after integration.
pub const BOID_SPEED: f64 = 1.0;

/// Number of long-lived update workers a flock starts with.
pub const DEFAULT_WORKER_COUNT: usize = 8;

pub const DEFAULT_FLOCK_PARAMETERS: utils::FlockParameters = utils::FlockParameters {
    vision: 50.0,
    alignment: 1.0,
    cohesion: 0.1,
    separation: 1.0,
};
