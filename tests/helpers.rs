use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;

pub struct TestServer {
    pub child: Child,
    pub lines: Arc<Mutex<Lines<BufReader<ChildStderr>>>>,
    pub base_url: String,
}

/// Runs `cargo run -- server start` with the given environment and waits
/// until the server reports it is listening. The server binds an ephemeral
/// port; the captured base URL points at it.
#[allow(dead_code)] // Not dead code, used in tests.
pub async fn start_server(env_vars: &[(&str, &str)]) -> TestServer {
    let mut child = Command::new("cargo")
        .args(["run", "--", "server", "start"])
        .env("RUST_LOG", "info")
        .env("SYNMON_SERVER_ADDRESS", "127.0.0.1")
        .env("SYNMON_SERVER_PORT", "0")
        .envs(env_vars.iter().copied())
        .stderr(Stdio::piped())
        .spawn()
        .expect("The command to start the server should spawn a child process.");

    // Capture the server's log output on stderr.
    let stderr = child
        .stderr
        .take()
        .expect("Stderr output should be captured.");
    let mut lines = BufReader::new(stderr).lines();

    // Wait for the server to start, picking the listen address out of the
    // log output along the way.
    let listen_re = Regex::new(r"Listening on (http://[0-9.]+:[0-9]+)")
        .expect("Failed to compile regex");
    let mut base_url = None;
    let startup = async {
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(captures) = listen_re.captures(&line) {
                base_url = Some(captures[1].to_string());
            }
            if line.contains("Server started.") {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(120), startup)
        .await
        .expect("The server should start within two minutes.");

    TestServer {
        child,
        lines: Arc::new(Mutex::new(lines)),
        base_url: base_url.expect("The server should log its listen address."),
    }
}

/// Sends SIGINT and waits for a clean exit.
#[allow(dead_code)] // Not dead code, used in tests.
pub async fn stop_server(child: &mut Child) {
    let pid = Pid::from_raw(
        child
            .id()
            .expect("The server process should be running and have a process ID.")
            as i32,
    );
    kill(pid, Signal::SIGINT).expect("The SIGINT signal should be sent.");

    // Wait for the server to shut down.
    let status = child.wait().await.expect("The server process should exit.");
    assert!(status.success(), "Server did not shut down gracefully");
}

/// Asserts that the remaining captured log lines match every given pattern.
#[allow(dead_code)] // Not dead code, used in tests.
pub async fn check_log_output_regex(
    lines: Arc<Mutex<Lines<BufReader<ChildStderr>>>>,
    regex_expected_lines: Vec<&str>,
) {
    let mut captured_lines = Vec::new();
    while let Ok(Some(line)) = lines.lock().await.next_line().await {
        captured_lines.push(line);
    }

    for expected_line in regex_expected_lines {
        let re = Regex::new(expected_line).expect("Failed to compile regex");
        let found = captured_lines.iter().any(|line| re.is_match(line));
        assert!(found, "The output contains the line '{}'.", expected_line);
    }
}
