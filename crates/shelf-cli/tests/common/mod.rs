//! Helpers for running the `shelf` binary against a mock server.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Run the CLI with an isolated data directory and the given server.
pub fn run_cli_with_env(args: &[&str], data_dir: &Path, server_url: &str) -> Output {
    run_cli_with_stdin(args, data_dir, server_url, "")
}

/// Same as [`run_cli_with_env`], feeding `stdin` to the process.
pub fn run_cli_with_stdin(args: &[&str], data_dir: &Path, server_url: &str, stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_shelf"))
        .args(args)
        .env("SHELF_DATA_DIR", data_dir)
        .env("SHELF_SERVER", server_url)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("SHELF_PASSWORD")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("Failed to write stdin");

    child.wait_with_output().expect("Failed to wait for CLI")
}

/// Run the CLI and expect success, returning stdout.
pub fn run_cli_with_env_success(args: &[&str], data_dir: &Path, server_url: &str) -> String {
    let output = run_cli_with_env(args, data_dir, server_url);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Run the CLI and expect failure, returning stderr.
pub fn run_cli_with_env_failure(args: &[&str], data_dir: &Path, server_url: &str) -> String {
    let output = run_cli_with_env(args, data_dir, server_url);
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        panic!("CLI command should have failed: {:?}\nstdout: {}", args, stdout);
    }
    String::from_utf8_lossy(&output.stderr).to_string()
}
