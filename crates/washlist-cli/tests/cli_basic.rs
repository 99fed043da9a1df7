//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway home directory and
//! database file.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::TempDir;

fn cli(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_washlist"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("WASHLIST_ENV")
        .env_remove("WASHLIST_LOG");
    cmd
}

/// Run a CLI command against `<home>/timers.db` and return output.
fn run_cli(home: &TempDir, args: &[&str]) -> (i32, String, String) {
    let db = home.path().join("timers.db");
    let output = cli(home.path())
        .arg("--db")
        .arg(&db)
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

#[test]
fn test_add_prints_inserted_event() {
    let home = TempDir::new().unwrap();
    let (code, stdout, stderr) = run_cli(&home, &["add", "5", "90"]);
    assert_eq!(code, 0, "add failed: {stderr}");

    let event: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(event["event"], "inserted");
    assert_eq!(event["level"], 5);
    assert_eq!(event["index"], 0);
}

#[test]
fn test_add_duplicate_level_fails() {
    let home = TempDir::new().unwrap();
    assert_eq!(run_cli(&home, &["add", "6", "30"]).0, 0);

    let (code, _, stderr) = run_cli(&home, &["add", "6", "45"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("already"), "unexpected stderr: {stderr}");
}

#[test]
fn test_add_out_of_range_level_fails() {
    let home = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(&home, &["add", "2", "30"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("outside the valid range"), "unexpected stderr: {stderr}");

    let (_, stdout, _) = run_cli(&home, &["list", "--json"]);
    let entries: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(entries.as_array().map(Vec::len), Some(0));
}

#[test]
fn test_list_json_is_sorted_by_expiry() {
    let home = TempDir::new().unwrap();
    assert_eq!(run_cli(&home, &["add", "9", "60"]).0, 0);
    assert_eq!(run_cli(&home, &["add", "4", "20"]).0, 0);

    let (code, stdout, stderr) = run_cli(&home, &["list", "--json"]);
    assert_eq!(code, 0, "list failed: {stderr}");
    let entries: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let levels: Vec<u64> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["level"].as_u64().unwrap())
        .collect();
    assert_eq!(levels, vec![4, 9]);
}

#[test]
fn test_list_text_when_empty() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(&home, &["list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("no timers running"));
}

#[test]
fn test_dismiss_removes_timer() {
    let home = TempDir::new().unwrap();
    assert_eq!(run_cli(&home, &["add", "11", "25"]).0, 0);

    let (code, stdout, stderr) = run_cli(&home, &["dismiss", "11"]);
    assert_eq!(code, 0, "dismiss failed: {stderr}");
    assert!(stdout.contains(r#""event":"removed""#));
    assert!(stdout.contains(r#""reason":"dismissed""#));

    let (code, _, stderr) = run_cli(&home, &["dismiss", "11"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("No timer registered"));
}

#[test]
fn test_config_set_and_get() {
    let home = TempDir::new().unwrap();
    let (code, stdout, stderr) = run_cli(&home, &["config", "set", "timers.imminent_window_min", "5"]);
    assert_eq!(code, 0, "config set failed: {stderr}");
    assert!(stdout.contains("ok"));

    let (code, stdout, _) = run_cli(&home, &["config", "get", "timers.imminent_window_min"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "5");

    let (code, _, _) = run_cli(&home, &["config", "get", "timers.nope"]);
    assert_ne!(code, 0);
}

#[test]
fn test_session_reads_commands_from_stdin() {
    let home = TempDir::new().unwrap();
    let mut child = cli(home.path())
        .args(["run", "--ephemeral"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start session");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"add 7 1\nadd 1 10\nlist\nquit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "session failed: {stderr}");
    assert!(stdout.contains(r#"{"event":"inserted","level":7,"index":0}"#));
    // One minute is already inside the imminent window.
    assert!(stdout.contains(r#"{"event":"marked_imminent","level":7}"#));
    assert!(stdout.contains("7. – "));
    assert!(stderr.contains("outside the valid range"));
}
