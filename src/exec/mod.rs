//! Execution control
//!
//! Cancellation scopes and blocking supervision of spawned children.

pub mod cancel;
pub mod supervisor;
