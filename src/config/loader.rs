/// Configuration loading for the build toolchain and process supervision
use crate::config::types::{MockaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment override for the compiler binary, checked before `RUSTC`.
pub const COMPILER_ENV: &str = "MOCKA_RUSTC";
/// Environment override for the directory that holds build workspaces.
pub const WORKSPACE_ROOT_ENV: &str = "MOCKA_WORKSPACE_ROOT";

const SUPPORTED_EDITIONS: &[&str] = &["2015", "2018", "2021", "2024"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockaConfig {
    /// Compiler executable used to build rendered sources
    pub compiler: String,
    /// Rust edition passed to the compiler
    pub edition: String,
    /// Extra compiler arguments, inserted before the output flag
    pub extra_args: Vec<String>,
    /// Parent directory for build workspaces (platform temp dir when unset)
    pub workspace_root: Option<PathBuf>,
    /// How often a supervised child is polled for exit
    pub poll_interval_ms: u64,
    /// Time between SIGTERM and SIGKILL when a run is cancelled
    pub kill_grace_ms: u64,
}

impl Default for MockaConfig {
    fn default() -> Self {
        Self {
            compiler: "rustc".to_string(),
            edition: "2021".to_string(),
            extra_args: Vec::new(),
            workspace_root: None,
            poll_interval_ms: 10,
            kill_grace_ms: 1000,
        }
    }
}

impl MockaConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(compiler) = non_empty_var(COMPILER_ENV).or_else(|| non_empty_var("RUSTC")) {
            config.compiler = compiler;
        }
        if let Some(root) = non_empty_var(WORKSPACE_ROOT_ENV) {
            config.workspace_root = Some(PathBuf::from(root));
        }

        config
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MockaError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: MockaConfig = serde_json::from_str(&content)
            .map_err(|e| MockaError::Config(format!("Failed to parse config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compiler.trim().is_empty() {
            return Err(MockaError::Config("compiler must not be empty".to_string()));
        }
        if !SUPPORTED_EDITIONS.contains(&self.edition.as_str()) {
            return Err(MockaError::Config(format!(
                "unsupported edition: {} (expected one of {})",
                self.edition,
                SUPPORTED_EDITIONS.join(", ")
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(MockaError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory under which build workspaces are allocated.
    pub fn resolved_workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
