//! Toolchain adapters.
//!
//! Program construction stays compiler-agnostic; an adapter supplies the
//! source file name and compile command.

pub mod adapter;
pub mod rustc;

use crate::config::loader::MockaConfig;
use crate::config::types::{MockaError, Result};
use crate::toolchain::adapter::Toolchain;
use crate::toolchain::rustc::RustcToolchain;
use std::path::Path;
use std::process::{Command, Stdio};

pub fn toolchain_for(config: &MockaConfig) -> Result<Box<dyn Toolchain>> {
    config.validate()?;
    Ok(Box::new(RustcToolchain::from_config(config)))
}

/// Run the toolchain's compile command to completion. Stdout is discarded and
/// stderr is kept for the error report.
pub fn compile(toolchain: &dyn Toolchain, source: &Path, output: &Path) -> Result<()> {
    let argv = toolchain.compile_command(source, output);
    let Some((program, args)) = argv.split_first() else {
        return Err(MockaError::Config(format!(
            "toolchain {} produced an empty compile command",
            toolchain.name()
        )));
    };

    log::debug!("Compiling with: {:?}", argv);
    let result = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| MockaError::CompilerLaunch {
            compiler: program.clone(),
            source,
        })?;

    if !result.status.success() {
        return Err(MockaError::CompilerFailed {
            status: result.status.code(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    Ok(())
}
