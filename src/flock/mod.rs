mod flock;

pub use flock::*;
