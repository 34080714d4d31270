mod constants;
mod constants_config;
pub mod errors;

pub use constants::*;
pub use constants_config::*;
pub use errors::FlockError;
pub(crate) use constants_config::check_non_negative;
