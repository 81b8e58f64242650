//! End-to-end lifecycle tests against a real Rust compiler.
//!
//! Each test returns early with a note when no compiler is on hand.

use mocka::{BuildableProgram, CancelScope, MockaConfig, MockaError};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn toolchain_available() -> bool {
    let compiler = MockaConfig::from_env().compiler;
    let available = Command::new(&compiler)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false);
    if !available {
        eprintln!("skipping: compiler {} not available", compiler);
    }
    available
}

fn test_config() -> MockaConfig {
    let mut config = MockaConfig::from_env();
    config.workspace_root = Some(
        std::env::temp_dir().join(format!("mocka_it_{}", uuid::Uuid::new_v4())),
    );
    config.poll_interval_ms = 5;
    config.kill_grace_ms = 1000;
    config
}

fn cleanup(program: &mut BuildableProgram) {
    let _ = program.cleanup();
    if let Some(root) = &program.config().workspace_root {
        let _ = std::fs::remove_dir_all(root);
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn http_get(port: u16, deadline: Duration) -> Option<String> {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if let Ok(mut stream) = TcpStream::connect(("127.0.0.1", port)) {
            let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
            let request = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
            if stream.write_all(request).is_ok() {
                let mut response = String::new();
                if stream.read_to_string(&mut response).is_ok() && !response.is_empty() {
                    return Some(response);
                }
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(unix)]
fn process_gone(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_err()
}

#[cfg(not(unix))]
fn process_gone(_pid: u32) -> bool {
    true
}

#[test]
fn test_console_program_exits_with_code() {
    init_logging();
    if !toolchain_available() {
        return;
    }

    let mut program = BuildableProgram::console(42).with_config(test_config()).unwrap();
    assert!(program.artifact_path().is_none());

    program.build().unwrap();
    let artifact = program.artifact_path().unwrap().to_path_buf();
    assert!(artifact.exists());
    assert!(is_executable(&artifact));

    let err = program.run(None).unwrap_err();
    assert_eq!(err.exit_code(), Some(42));

    cleanup(&mut program);
}

#[test]
fn test_console_program_zero_exit_is_ok() {
    init_logging();
    if !toolchain_available() {
        return;
    }

    let mut program = BuildableProgram::console(0).with_config(test_config()).unwrap();
    program.build().unwrap();
    program.run(None).unwrap();
    // Runs are independent; a second one behaves the same.
    program.run(None).unwrap();

    cleanup(&mut program);
}

#[test]
fn test_exe_copies_match_artifact() {
    init_logging();
    if !toolchain_available() {
        return;
    }

    let mut program = BuildableProgram::console(3).with_config(test_config()).unwrap();
    program.build().unwrap();
    let expected = std::fs::read(program.artifact_path().unwrap()).unwrap();

    let mut written = Vec::new();
    program.write_exe(&mut written).unwrap();
    assert_eq!(written, expected);

    let copy = std::env::temp_dir().join(format!("mocka_copy_{}", uuid::Uuid::new_v4()));
    program.copy_exe(&copy).unwrap();
    assert_eq!(std::fs::read(&copy).unwrap(), expected);

    let _ = std::fs::remove_file(&copy);
    cleanup(&mut program);
}

#[test]
fn test_out_of_range_port_fails_to_compile() {
    init_logging();
    if !toolchain_available() {
        return;
    }

    let mut program = BuildableProgram::web_server(70_000, 200, "OK")
        .with_config(test_config())
        .unwrap();
    let err = program.build().unwrap_err();
    match err {
        MockaError::CompilerFailed { stderr, .. } => assert!(!stderr.is_empty()),
        other => panic!("unexpected error: {other}"),
    }
    assert!(program.artifact_path().is_none());

    cleanup(&mut program);
}

#[test]
fn test_web_server_serves_status_until_stopped() {
    init_logging();
    if !toolchain_available() {
        return;
    }

    let port = free_port();
    let mut program = BuildableProgram::web_server(u32::from(port), 404, "Not Found")
        .with_config(test_config())
        .unwrap();
    program.build().unwrap();

    let (response, outcome, stopped_in) = std::thread::scope(|s| {
        let runner = s.spawn(|| program.run(None));
        let response = http_get(port, Duration::from_secs(10));

        let stop_at = Instant::now();
        program.stop();
        let outcome = runner.join().unwrap();
        (response, outcome, stop_at.elapsed())
    });

    let response = response.expect("web server did not answer");
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
    assert!(response.ends_with("\r\n\r\nNot Found"), "{response}");

    assert!(stopped_in < Duration::from_secs(5));
    match outcome.unwrap_err() {
        MockaError::Cancelled { pid, kill_report } => {
            assert!(kill_report.term_sent);
            assert!(process_gone(pid.unwrap()));
        }
        other => panic!("unexpected error: {other}"),
    }

    cleanup(&mut program);
}

#[test]
fn test_external_scope_controls_run() {
    init_logging();
    if !toolchain_available() {
        return;
    }

    let port = free_port();
    let mut program = BuildableProgram::web_server(u32::from(port), 200, "OK")
        .with_config(test_config())
        .unwrap();
    program.build().unwrap();

    let parent = CancelScope::new();
    let scope = parent.child();

    let (first, after_stop, outcome) = std::thread::scope(|s| {
        let runner = s.spawn(|| program.run(Some(&scope)));
        let first = http_get(port, Duration::from_secs(10));

        // The program's own scope does not reach this run.
        program.stop();
        std::thread::sleep(Duration::from_millis(100));
        let after_stop = http_get(port, Duration::from_secs(5));

        parent.cancel();
        (first, after_stop, runner.join().unwrap())
    });

    assert!(first.is_some_and(|r| r.starts_with("HTTP/1.1 200 OK\r\n")));
    assert!(after_stop.is_some());
    assert!(outcome.unwrap_err().is_cancelled());
    cleanup(&mut program);
}

#[test]
fn test_quoted_status_message_is_served_verbatim() {
    init_logging();
    if !toolchain_available() {
        return;
    }

    let message = r##"say "hi" \ "# ok"##;
    let port = free_port();
    let mut program = BuildableProgram::web_server(u32::from(port), 200, message)
        .with_config(test_config())
        .unwrap();
    program.build().unwrap();

    let scope = CancelScope::new();
    let (response, outcome) = std::thread::scope(|s| {
        let runner = s.spawn(|| program.run(Some(&scope)));
        let response = http_get(port, Duration::from_secs(10));
        scope.cancel();
        (response, runner.join().unwrap())
    });

    let response = response.expect("web server did not answer");
    assert!(response.ends_with(&format!("\r\n\r\n{message}")), "{response}");
    assert!(outcome.unwrap_err().is_cancelled());

    cleanup(&mut program);
}
