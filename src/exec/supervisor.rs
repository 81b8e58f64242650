use crate::config::loader::MockaConfig;
use crate::config::types::{ExitReport, KillReport, MockaError, Result};
use crate::exec::cancel::CancelScope;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

const REAP_POLL: Duration = Duration::from_millis(10);

/// Timing knobs for [`supervise`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisePolicy {
    pub poll_interval: Duration,
    pub kill_grace: Duration,
}

impl SupervisePolicy {
    pub fn from_config(config: &MockaConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            kill_grace: config.kill_grace(),
        }
    }
}

impl Default for SupervisePolicy {
    fn default() -> Self {
        Self::from_config(&MockaConfig::default())
    }
}

/// Spawn `command` and block until it exits or `scope` is cancelled.
///
/// Nothing is spawned if the scope is already cancelled. On cancellation the
/// child gets SIGTERM, then SIGKILL once `kill_grace` has passed, and is
/// reaped before this returns.
pub fn supervise(
    mut command: Command,
    scope: &CancelScope,
    policy: &SupervisePolicy,
) -> Result<ExitReport> {
    let program = PathBuf::from(command.get_program());

    if scope.is_cancelled() {
        return Err(MockaError::Cancelled {
            pid: None,
            kill_report: KillReport {
                notes: vec!["scope cancelled before spawn".to_string()],
                ..KillReport::default()
            },
        });
    }

    let start = Instant::now();
    let mut child = command
        .spawn()
        .map_err(|source| MockaError::ProcessLaunch {
            program: program.clone(),
            source,
        })?;
    let pid = child.id();
    log::debug!("Spawned {} (pid {})", program.display(), pid);

    loop {
        if let Some(status) = poll_exit(&mut child, policy.kill_grace)? {
            return exit_outcome(pid, status, start);
        }

        if scope.wait_timeout(policy.poll_interval) {
            if let Some(status) = poll_exit(&mut child, policy.kill_grace)? {
                return exit_outcome(pid, status, start);
            }
            log::info!("Cancelling {} (pid {})", program.display(), pid);
            let kill_report = terminate_child(&mut child, policy.kill_grace);
            return Err(MockaError::Cancelled {
                pid: Some(pid),
                kill_report,
            });
        }
    }
}

/// Non-blocking exit check. If waiting itself fails the child is taken down
/// before the error is returned, so it never outlives the supervisor.
fn poll_exit(child: &mut Child, kill_grace: Duration) -> Result<Option<ExitStatus>> {
    match child.try_wait() {
        Ok(status) => Ok(status),
        Err(source) => {
            let pid = child.id();
            log::warn!("Waiting on pid {} failed: {}; terminating", pid, source);
            let kill_report = terminate_child(child, kill_grace);
            Err(MockaError::Wait {
                pid,
                source,
                kill_report,
            })
        }
    }
}

fn exit_outcome(pid: u32, status: ExitStatus, start: Instant) -> Result<ExitReport> {
    let wall_time_ms = start.elapsed().as_millis() as u64;
    if status.success() {
        log::debug!("pid {} exited cleanly after {}ms", pid, wall_time_ms);
        return Ok(ExitReport {
            pid,
            code: status.code(),
            wall_time_ms,
        });
    }

    log::debug!("pid {} exited with {}", pid, status);
    Err(MockaError::ProcessFailed {
        pid,
        code: status.code(),
        signal: exit_signal(&status),
    })
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

#[cfg(unix)]
fn terminate_child(child: &mut Child, grace: Duration) -> KillReport {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let mut report = KillReport::default();
    let start = Instant::now();

    match signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
        Ok(()) => report.term_sent = true,
        Err(e) => report.notes.push(format!("SIGTERM failed: {}", e)),
    }

    while start.elapsed() < grace {
        match child.try_wait() {
            Ok(Some(_)) => {
                report.waited_ms = start.elapsed().as_millis() as u64;
                return report;
            }
            Ok(None) => std::thread::sleep(REAP_POLL.min(grace.saturating_sub(start.elapsed()))),
            Err(e) => {
                report.notes.push(format!("wait after SIGTERM failed: {}", e));
                break;
            }
        }
    }

    force_kill(child, &mut report);
    report.waited_ms = start.elapsed().as_millis() as u64;
    report
}

#[cfg(not(unix))]
fn terminate_child(child: &mut Child, _grace: Duration) -> KillReport {
    let mut report = KillReport::default();
    let start = Instant::now();
    report
        .notes
        .push("graceful termination unavailable on this platform".to_string());
    force_kill(child, &mut report);
    report.waited_ms = start.elapsed().as_millis() as u64;
    report
}

fn force_kill(child: &mut Child, report: &mut KillReport) {
    match child.kill() {
        Ok(()) => report.kill_sent = true,
        Err(e) => report.notes.push(format!("kill failed: {}", e)),
    }
    if let Err(e) = child.wait() {
        report.notes.push(format!("reap failed: {}", e));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;

    fn fast_policy() -> SupervisePolicy {
        SupervisePolicy {
            poll_interval: Duration::from_millis(5),
            kill_grace: Duration::from_millis(500),
        }
    }

    fn shell(script: &str) -> Command {
        let mut command = Command::new("/bin/sh");
        command
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    #[test]
    fn test_successful_exit() {
        let report = supervise(shell("exit 0"), &CancelScope::new(), &fast_policy()).unwrap();
        assert_eq!(report.code, Some(0));
    }

    #[test]
    fn test_nonzero_exit_is_error() {
        let err = supervise(shell("exit 7"), &CancelScope::new(), &fast_policy()).unwrap_err();
        assert_eq!(err.exit_code(), Some(7));
    }

    #[test]
    fn test_missing_program() {
        let err = supervise(
            Command::new("/nonexistent/mocka-binary"),
            &CancelScope::new(),
            &fast_policy(),
        )
        .unwrap_err();
        match err {
            MockaError::ProcessLaunch { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancelled_scope_does_not_spawn() {
        let scope = CancelScope::new();
        scope.cancel();
        let err = supervise(shell("exit 0"), &scope, &fast_policy()).unwrap_err();
        match err {
            MockaError::Cancelled { pid, .. } => assert!(pid.is_none()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancel_terminates_running_child() {
        let scope = CancelScope::new();
        let canceller = scope.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });

        let start = Instant::now();
        let err = supervise(shell("sleep 30"), &scope, &fast_policy()).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(10));
        handle.join().unwrap();

        match err {
            MockaError::Cancelled { pid, kill_report } => {
                assert!(pid.is_some());
                assert!(kill_report.term_sent);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wait_failure_terminates_and_reports() {
        use nix::sys::wait::waitpid;
        use nix::unistd::Pid;

        let mut child = shell("exit 0").spawn().unwrap();
        // Reaping behind std's back makes its own wait fail with ECHILD.
        waitpid(Pid::from_raw(child.id() as i32), None).unwrap();

        let start = Instant::now();
        let err = poll_exit(&mut child, Duration::from_millis(200)).unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(5));

        match err {
            MockaError::Wait {
                pid, kill_report, ..
            } => {
                assert_eq!(pid, child.id());
                assert!(
                    kill_report.term_sent || kill_report.kill_sent || !kill_report.notes.is_empty()
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_escalates_when_term_is_ignored() {
        let scope = CancelScope::new();
        let canceller = scope.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            canceller.cancel();
        });

        let policy = SupervisePolicy {
            poll_interval: Duration::from_millis(5),
            kill_grace: Duration::from_millis(200),
        };
        let err = supervise(shell("trap '' TERM; sleep 30"), &scope, &policy).unwrap_err();
        handle.join().unwrap();

        match err {
            MockaError::Cancelled { kill_report, .. } => assert!(kill_report.kill_sent),
            other => panic!("unexpected error: {other}"),
        }
    }
}
