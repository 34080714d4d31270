mod bounds;
mod boid;

pub use bounds::*;
pub use boid::*;

#[cfg(test)]
mod boid_tests;
