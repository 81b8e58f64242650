use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// How a cancelled child was brought down.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillReport {
    pub term_sent: bool,
    pub kill_sent: bool,
    pub waited_ms: u64,
    pub notes: Vec<String>,
}

/// Outcome of a child that ran to a successful exit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReport {
    pub pid: u32,
    pub code: Option<i32>,
    pub wall_time_ms: u64,
}

/// Error types for mocka
#[derive(Error, Debug)]
pub enum MockaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to launch compiler {compiler}: {source}")]
    CompilerLaunch {
        compiler: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Compiler exited with status {status:?}: {stderr}")]
    CompilerFailed { status: Option<i32>, stderr: String },

    #[error("No artifact available: build the program first")]
    ArtifactNotFound,

    #[error("Failed to launch {}: {source}", .program.display())]
    ProcessLaunch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Process {pid} failed (exit code {code:?}, signal {signal:?})")]
    ProcessFailed {
        pid: u32,
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("Failed to wait on pid {pid}: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
        kill_report: KillReport,
    },

    #[error("Process cancelled (pid {pid:?})")]
    Cancelled {
        pid: Option<u32>,
        kill_report: KillReport,
    },
}

impl MockaError {
    /// Non-zero exit status of the artifact (`ProcessFailed`) or of the
    /// compiler (`CompilerFailed`). `None` for every other error.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            MockaError::ProcessFailed { code, .. } => *code,
            MockaError::CompilerFailed { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MockaError::Cancelled { .. })
    }

    pub fn is_artifact_not_found(&self) -> bool {
        matches!(self, MockaError::ArtifactNotFound)
    }
}

pub type Result<T> = std::result::Result<T, MockaError>;
