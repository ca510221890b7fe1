//! End-to-end tests for the fragstats CLI
//!
//! Each test runs the binary in an isolated XDG environment so database,
//! config, and log files land in a temp directory.

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join("home");
        std::fs::create_dir_all(&home).expect("failed to create HOME");
        Self {
            _temp_dir: temp_dir,
            home,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("fragstats"));
        Command::new(bin_path)
            .args(args)
            .env("HOME", &self.home)
            .env("XDG_DATA_HOME", self.home.join(".local/share"))
            .env("XDG_STATE_HOME", self.home.join(".local/state"))
            .env("XDG_CONFIG_HOME", self.home.join(".config"))
            .output()
            .expect("failed to run fragstats")
    }

    fn run_with_stdin(&self, args: &[&str], stdin: &str) -> Output {
        use std::io::Write;
        use std::process::Stdio;

        let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("fragstats"));
        let mut child = Command::new(bin_path)
            .args(args)
            .env("HOME", &self.home)
            .env("XDG_DATA_HOME", self.home.join(".local/share"))
            .env("XDG_STATE_HOME", self.home.join(".local/state"))
            .env("XDG_CONFIG_HOME", self.home.join(".config"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn fragstats");
        child
            .stdin
            .as_mut()
            .expect("missing stdin")
            .write_all(stdin.as_bytes())
            .expect("failed to write stdin");
        child.wait_with_output().expect("failed to run fragstats")
    }
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

const KILL_LINE: &str = r#"L 08/15/2025 - 21:30:45: "Alice<5><STEAM_1:0:111><CT>" killed "Bob<7><STEAM_1:0:222><TERRORIST>" with "ak47" (headshot)"#;

#[test]
fn test_parse_emits_json_events() {
    let env = CliTestEnv::new();

    let output = env.run_with_stdin(&["parse"], &format!("{}\nnot a log line\n", KILL_LINE));
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let stdout = stdout_of(&output);
    assert!(stdout.contains(r#""type": "kill""#), "stdout: {stdout}");
    assert!(stdout.contains(r#""headshot": true"#), "stdout: {stdout}");
    assert!(stderr_of(&output).contains("unmatched: not a log line"));
}

#[test]
fn test_server_add_list_and_sync() {
    let env = CliTestEnv::new();

    let output = env.run(&[
        "server",
        "add",
        "--game",
        "cstrike",
        "--name",
        "dust-only",
        "--address",
        "192.168.0.10",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(stdout_of(&output).contains("id 1"));

    let output = env.run(&["server", "list"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("dust-only"), "stdout: {stdout}");
    assert!(stdout.contains("192.168.0.10:27015"), "stdout: {stdout}");

    // Sync a directory with one log file end to end
    let logs = TempDir::new().unwrap();
    std::fs::write(logs.path().join("server.log"), format!("{}\n", KILL_LINE)).unwrap();
    let logs_dir = logs.path().to_str().unwrap();

    let output = env.run(&["sync", "--server", "1", "--dir", logs_dir]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(stdout_of(&output).contains("Kills recorded:   1"));

    let output = env.run(&["top", "--game", "cstrike"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Alice"), "stdout: {stdout}");
    assert!(stdout.contains("1020"), "stdout: {stdout}");
}

#[test]
fn test_sync_dry_run_writes_nothing() {
    let env = CliTestEnv::new();

    let output = env.run(&[
        "server",
        "add",
        "--game",
        "cstrike",
        "--name",
        "s1",
        "--address",
        "127.0.0.1",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let logs = TempDir::new().unwrap();
    std::fs::write(logs.path().join("server.log"), format!("{}\n", KILL_LINE)).unwrap();
    let logs_dir = logs.path().to_str().unwrap();

    let output = env.run(&["sync", "--server", "1", "--dry-run", "--dir", logs_dir]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("Dry run"));

    let output = env.run(&["top", "--game", "cstrike"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("No ranked players"));
}

#[test]
fn test_sync_unknown_server_fails() {
    let env = CliTestEnv::new();
    let logs = TempDir::new().unwrap();
    let logs_dir = logs.path().to_str().unwrap();

    let output = env.run(&["sync", "--server", "42", "--dir", logs_dir]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("no server with id 42"));
}
