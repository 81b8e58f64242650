//! mocka: throwaway programs built on demand
//!
//! Renders a small program from a template, compiles it with an external
//! toolchain, and runs the result under a cancellable scope. Useful wherever a
//! test needs a real executable that exits with a known code, or a real HTTP
//! server that always answers with a known status.
//!
//! # Architecture
//!
//! ## Program lifecycle ([`program`])
//! - [`program::BuildableProgram`]: render, build, expose and run one program
//! - [`program::ProgramKind`]: console or web server variant
//!
//! ## Templates ([`templates`])
//! - Source text with `{{name}}` placeholders, resolved in a single pass
//!
//! ## Toolchains ([`toolchain`])
//! - [`toolchain::adapter::Toolchain`]: compile command contract
//! - [`toolchain::rustc`]: `rustc` adapter
//!
//! ## Execution Control ([`exec`])
//! - [`exec::cancel`]: cancellation scopes
//! - [`exec::supervisor`]: blocking spawn/wait with SIGTERM/SIGKILL escalation
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::workspace`]: per-build workspaces and opt-in removal
//!
//! ## Observability ([`observability`])
//! - [`observability::events`]: structured lifecycle events
//!
//! ## Configuration ([`config`])
//! - [`config::loader`]: toolchain and supervision settings
//! - [`config::types`]: error enum and shared reports
//!
//! # Example
//!
//! ```no_run
//! use mocka::BuildableProgram;
//!
//! let mut program = BuildableProgram::console(42);
//! program.build()?;
//! let err = program.run(None).unwrap_err();
//! assert_eq!(err.exit_code(), Some(42));
//! # Ok::<(), mocka::MockaError>(())
//! ```

pub mod config;
pub mod exec;
pub mod observability;
pub mod program;
pub mod safety;
pub mod templates;
pub mod toolchain;

pub use config::loader::MockaConfig;
pub use config::types::{ExitReport, KillReport, MockaError, Result};
pub use exec::cancel::CancelScope;
pub use program::{BuildableProgram, ProgramKind};
