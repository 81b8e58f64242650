//! Configuration and error types
//!
//! Toolchain/run settings and the crate-wide error enum.

pub mod loader;
pub mod types;
