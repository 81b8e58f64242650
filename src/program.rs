//! Buildable programs
//!
//! A [`BuildableProgram`] renders its source once at construction, compiles it
//! into a fresh workspace on [`BuildableProgram::build`], and launches the
//! artifact under a cancellation scope on [`BuildableProgram::run`].

use crate::config::loader::MockaConfig;
use crate::config::types::{MockaError, Result};
use crate::exec::cancel::CancelScope;
use crate::exec::supervisor::{supervise, SupervisePolicy};
use crate::observability::events::{emit, ProgramEvent, ProgramEventType};
use crate::safety::workspace::BuildWorkspace;
use crate::templates::{self, Template};
use crate::toolchain::adapter::Toolchain;
use crate::toolchain::rustc::RustcToolchain;
use crate::toolchain::{self as tc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use uuid::Uuid;

/// What the generated program does when run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramKind {
    /// Exits immediately with `exit_code`.
    Console { exit_code: i32 },
    /// Answers every HTTP request on `port` with `status_code` and
    /// `status_message` (status line reason phrase and body).
    WebServer {
        port: u32,
        status_code: u16,
        status_message: String,
    },
}

impl ProgramKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProgramKind::Console { .. } => "console",
            ProgramKind::WebServer { .. } => "webserver",
        }
    }

    fn template(&self) -> &'static Template {
        match self {
            ProgramKind::Console { .. } => &*templates::CONSOLE,
            ProgramKind::WebServer { .. } => &*templates::WEB_SERVER,
        }
    }

    fn substitutions(&self) -> Vec<(&'static str, String)> {
        match self {
            ProgramKind::Console { exit_code } => {
                vec![(templates::EXIT_CODE, exit_code.to_string())]
            }
            ProgramKind::WebServer {
                port,
                status_code,
                status_message,
            } => vec![
                (templates::PORT, port.to_string()),
                (templates::STATUS_CODE, status_code.to_string()),
                (templates::STATUS_MESSAGE, status_message.clone()),
                (
                    templates::RAW_DELIMITER,
                    templates::raw_delimiter(status_message),
                ),
            ],
        }
    }

    /// Final program text. Numbers are embedded verbatim, so a value that is
    /// not valid in its position surfaces later as a compile failure. The
    /// status message goes into a raw string literal and is taken as-is.
    pub fn render(&self) -> String {
        self.template().render(&self.substitutions())
    }
}

#[derive(Debug)]
pub struct BuildableProgram {
    id: String,
    kind: ProgramKind,
    source: String,
    artifact_path: Option<PathBuf>,
    scope: CancelScope,
    config: MockaConfig,
    toolchain: Box<dyn Toolchain>,
    workspaces: Vec<BuildWorkspace>,
}

impl BuildableProgram {
    fn new(kind: ProgramKind) -> Self {
        let config = MockaConfig::from_env();
        let toolchain: Box<dyn Toolchain> = Box::new(RustcToolchain::from_config(&config));
        let source = kind.render();
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            source,
            artifact_path: None,
            scope: CancelScope::new(),
            config,
            toolchain,
            workspaces: Vec::new(),
        }
    }

    /// A program that exits with `exit_code` when run. The value is not
    /// range-checked; the platform truncates it as it sees fit.
    pub fn console(exit_code: i32) -> Self {
        Self::new(ProgramKind::Console { exit_code })
    }

    /// A program that serves every request on `port` with `status_code` and
    /// `status_message`. Nothing is validated here.
    pub fn web_server(port: u32, status_code: u16, status_message: impl Into<String>) -> Self {
        Self::new(ProgramKind::WebServer {
            port,
            status_code,
            status_message: status_message.into(),
        })
    }

    /// Replace the configuration; the toolchain is rebuilt from it.
    pub fn with_config(mut self, config: MockaConfig) -> Result<Self> {
        self.toolchain = tc::toolchain_for(&config)?;
        self.config = config;
        Ok(self)
    }

    pub fn with_toolchain(mut self, toolchain: Box<dyn Toolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ProgramKind {
        &self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn config(&self) -> &MockaConfig {
        &self.config
    }

    /// The scope used by [`run`](Self::run) when no scope is passed in.
    pub fn cancel_scope(&self) -> &CancelScope {
        &self.scope
    }

    /// Every workspace allocated by `build` and not yet removed.
    pub fn workspaces(&self) -> &[BuildWorkspace] {
        &self.workspaces
    }

    /// Path of the last successfully built artifact.
    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    pub fn write_source<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(self.source.as_bytes())?;
        Ok(())
    }

    /// Create or truncate `path` and write the rendered source into it.
    pub fn copy_source<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file = fs::File::create(path).map_err(|e| {
            MockaError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create source file {}: {}", path.display(), e),
            ))
        })?;

        file.write_all(self.source.as_bytes()).map_err(|e| {
            MockaError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write source file {}: {}", path.display(), e),
            ))
        })
    }

    /// Compile the rendered source in a new workspace. The artifact path is
    /// only updated on success; the workspace is left on disk either way.
    pub fn build(&mut self) -> Result<()> {
        let root = self.config.resolved_workspace_root();
        emit(
            ProgramEvent::new(
                ProgramEventType::BuildStarted,
                &self.id,
                format!("building {} program", self.kind.label()),
            )
            .with_path(&root),
        );

        match self.build_in_new_workspace(&root) {
            Ok(artifact) => {
                log::info!("Built {} program at {}", self.kind.label(), artifact.display());
                emit(
                    ProgramEvent::new(ProgramEventType::BuildSucceeded, &self.id, "build succeeded")
                        .with_path(&artifact),
                );
                self.artifact_path = Some(artifact);
                Ok(())
            }
            Err(e) => {
                emit(ProgramEvent::new(
                    ProgramEventType::BuildFailed,
                    &self.id,
                    e.to_string(),
                ));
                Err(e)
            }
        }
    }

    fn build_in_new_workspace(&mut self, root: &Path) -> Result<PathBuf> {
        let workspace = BuildWorkspace::create(root)?;
        self.workspaces.push(workspace.clone());

        let source = workspace.source_path(self.toolchain.source_file_name());
        self.copy_source(&source)?;

        let artifact = workspace.artifact_path();
        tc::compile(self.toolchain.as_ref(), &source, &artifact)?;
        Ok(artifact)
    }

    fn read_artifact(&self) -> Result<Vec<u8>> {
        let path = self.artifact_path().ok_or(MockaError::ArtifactNotFound)?;
        fs::read(path).map_err(|e| {
            MockaError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read artifact {}: {}", path.display(), e),
            ))
        })
    }

    pub fn write_exe<W: Write>(&self, mut writer: W) -> Result<()> {
        let content = self.read_artifact()?;
        writer.write_all(&content)?;
        Ok(())
    }

    /// Copy the artifact to `path`. A new file is created with mode 0666
    /// (before umask); an existing file keeps its permissions.
    pub fn copy_exe<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.read_artifact()?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o666);
        }

        let mut file = options.open(path).map_err(|e| {
            MockaError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create {}: {}", path.display(), e),
            ))
        })?;
        file.write_all(&content).map_err(|e| {
            MockaError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write {}: {}", path.display(), e),
            ))
        })
    }

    /// Run the artifact and block until it exits or the scope is cancelled.
    ///
    /// `scope` overrides the program's own scope for this run; cancelling it
    /// is then the caller's job, and [`stop`](Self::stop) does not reach it.
    pub fn run(&self, scope: Option<&CancelScope>) -> Result<()> {
        let path = self.artifact_path().ok_or(MockaError::ArtifactNotFound)?;
        let scope = scope.unwrap_or(&self.scope);

        let mut command = Command::new(path);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        emit(
            ProgramEvent::new(ProgramEventType::RunStarted, &self.id, "starting artifact")
                .with_path(path),
        );

        let outcome = supervise(command, scope, &SupervisePolicy::from_config(&self.config));
        match &outcome {
            Ok(report) => emit(
                ProgramEvent::new(ProgramEventType::RunExited, &self.id, "exited")
                    .with_pid(Some(report.pid))
                    .with_exit_code(report.code),
            ),
            Err(MockaError::ProcessFailed { pid, code, signal }) => emit(
                ProgramEvent::new(
                    ProgramEventType::RunExited,
                    &self.id,
                    format!("exited unsuccessfully (signal {:?})", signal),
                )
                .with_pid(Some(*pid))
                .with_exit_code(*code),
            ),
            Err(MockaError::Cancelled { pid, kill_report }) => {
                if kill_report.kill_sent {
                    emit(
                        ProgramEvent::new(
                            ProgramEventType::SignalEscalation,
                            &self.id,
                            format!("SIGKILL after {}ms", kill_report.waited_ms),
                        )
                        .with_pid(*pid),
                    );
                }
                emit(
                    ProgramEvent::new(ProgramEventType::RunCancelled, &self.id, "cancelled")
                        .with_pid(*pid),
                );
            }
            Err(_) => {}
        }

        outcome.map(|_| ())
    }

    /// Cancel the program's own scope. Runs given an explicit scope are not
    /// affected. Safe to call any number of times.
    pub fn stop(&self) {
        if !self.scope.is_cancelled() {
            log::info!("Stopping {} program {}", self.kind.label(), self.id);
        }
        self.scope.cancel();
    }

    /// Remove every workspace this program created and forget the artifact.
    /// Returns how many workspaces were removed; the first failure is
    /// returned after all removals have been attempted.
    pub fn cleanup(&mut self) -> Result<usize> {
        let mut removed = 0;
        let mut first_error = None;
        let mut remaining = Vec::new();

        for workspace in self.workspaces.drain(..) {
            match workspace.remove() {
                Ok(()) => {
                    removed += 1;
                    emit(
                        ProgramEvent::new(
                            ProgramEventType::WorkspaceRemoved,
                            &self.id,
                            "workspace removed",
                        )
                        .with_path(workspace.dir()),
                    );
                }
                Err(e) => {
                    log::warn!("Failed to remove {}: {}", workspace.dir().display(), e);
                    first_error.get_or_insert(e);
                    remaining.push(workspace);
                }
            }
        }

        self.workspaces = remaining;
        let artifact_survives = self
            .artifact_path
            .as_deref()
            .is_some_and(|artifact| self.workspaces.iter().any(|w| artifact.starts_with(w.dir())));
        if !artifact_survives {
            self.artifact_path = None;
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }
}
