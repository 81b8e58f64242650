//! Structured lifecycle events for built programs.
//! Each event is emitted as a single JSON line on the `mocka::events` log target.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const EVENT_TARGET: &str = "mocka::events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramEventType {
    BuildStarted,
    BuildSucceeded,
    BuildFailed,
    RunStarted,
    RunExited,
    RunCancelled,
    SignalEscalation,
    WorkspaceRemoved,
}

impl ProgramEventType {
    /// Failures and forced kills are logged at warn level.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ProgramEventType::BuildFailed | ProgramEventType::SignalEscalation
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramEvent {
    pub event_type: ProgramEventType,
    pub timestamp: DateTime<Utc>,
    pub program_id: String,
    pub details: String,
    pub path: Option<String>,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
}

impl ProgramEvent {
    pub fn new(event_type: ProgramEventType, program_id: &str, details: impl Into<String>) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            program_id: program_id.to_string(),
            details: details.into(),
            path: None,
            pid: None,
            exit_code: None,
        }
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.display().to_string());
        self
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "event_type": self.event_type,
                "program_id": self.program_id,
                "details": self.details,
            })
        })
    }
}

pub fn emit(event: ProgramEvent) {
    let line = event.to_json().to_string();
    if event.event_type.is_warning() {
        warn!(target: EVENT_TARGET, "{}", line);
    } else {
        info!(target: EVENT_TARGET, "{}", line);
    }
}
