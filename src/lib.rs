//! Parallel boid flocking core.
//!
//! - [`models`]: the boid and its steering/integration math.
//! - [`pool`]: size-bucketed reusable buffers for neighbour lists.
//! - [`spatial`]: the uniform grid answering radius queries.
//! - [`scheduler`]: the fixed worker pool running the two-phase update.
//! - [`flock`]: the facade a frame loop talks to.
pub mod utils;
pub mod models;
pub mod pool;
pub mod spatial;
pub mod scheduler;
pub mod flock;

pub use flock::Flock;
pub use models::{Boid, Bounds};
pub use utils::{FlockConfig, FlockError, FlockParameters};
