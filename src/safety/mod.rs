//! Safety and cleanup
//!
//! Run-scoped build workspaces and explicit, opt-in cleanup.

pub mod workspace;
