mod buffer_pool;

pub use buffer_pool::*;

#[cfg(test)]
mod buffer_pool_tests;
