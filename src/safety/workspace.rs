/// Build workspaces: one freshly allocated directory per build attempt.
/// Directories are never removed implicitly; callers opt in through
/// `remove()` or `sweep_stale_workspaces()`.
use crate::config::types::{MockaError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Prefix shared by every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "mocka-";

/// Base name of the compiled artifact inside a workspace.
pub const ARTIFACT_NAME: &str = "mocka";

/// A uniquely named directory holding one build's source and artifact
#[derive(Debug, Clone)]
pub struct BuildWorkspace {
    run_id: String,
    dir: PathBuf,
}

impl BuildWorkspace {
    /// Allocate a new workspace under `root`, creating `root` if needed.
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| {
            MockaError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create workspace root {}: {}",
                    root.display(),
                    e
                ),
            ))
        })?;

        let run_id = Uuid::new_v4().to_string();
        let dir = root.join(format!("{}{}", WORKSPACE_PREFIX, run_id));

        // create_dir (not _all) so a name collision surfaces as an error
        fs::create_dir(&dir).map_err(|e| {
            MockaError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create workspace directory {}: {}", dir.display(), e),
            ))
        })?;

        log::debug!("Created build workspace {}", dir.display());
        Ok(Self { run_id, dir })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Artifact path with the platform executable suffix applied.
    pub fn artifact_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}{}", ARTIFACT_NAME, std::env::consts::EXE_SUFFIX))
    }

    pub fn exists(&self) -> bool {
        self.dir.exists()
    }

    /// Remove the workspace and everything in it (idempotent).
    pub fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                log::debug!("Removed build workspace {}", self.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MockaError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to remove workspace directory {}: {}",
                    self.dir.display(),
                    e
                ),
            ))),
        }
    }
}

/// Remove `mocka-*` workspaces under `root` last modified more than
/// `max_age` ago. Returns how many were removed; unreadable entries are skipped.
pub fn sweep_stale_workspaces(root: &Path, max_age: Duration) -> Result<usize> {
    let mut cleaned = 0;
    let now = SystemTime::now();

    if !root.exists() {
        return Ok(0);
    }

    let entries = fs::read_dir(root).map_err(|e| {
        MockaError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read workspace root {}: {}", root.display(), e),
        ))
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Failed to read directory entry: {}", e);
                continue;
            }
        };

        let is_workspace = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(WORKSPACE_PREFIX));
        let path = entry.path();
        if !is_workspace || !path.is_dir() {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Failed to get modified time for {}: {}", path.display(), e);
                continue;
            }
        };

        let age = match now.duration_since(modified) {
            Ok(d) => d,
            Err(_) => continue, // Future timestamp, skip
        };

        if age > max_age {
            log::info!("Removing stale workspace: {}", path.display());
            if let Err(e) = fs::remove_dir_all(&path) {
                log::warn!("Failed to remove stale workspace {}: {}", path.display(), e);
            } else {
                cleaned += 1;
            }
        }
    }

    Ok(cleaned)
}
