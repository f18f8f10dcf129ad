use std::process::{Command, Output};

fn tikv_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tikv-cli"))
        .args(args)
        .output()
        .expect("failed to run tikv-cli")
}

#[test]
fn test_version_exits_zero() {
    let output = tikv_cli(&["version"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("tikv-cli "));
    assert!(stdout.contains("Git Commit:"));
}

#[test]
fn test_help_is_long_only() {
    let output = tikv_cli(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--host"));
    assert!(stdout.contains("scan"));
}

#[test]
fn test_usage_error_exits_one() {
    for args in [&["--no-such-flag"][..], &["-m", "kv", "get", "k"], &["get"]] {
        let output = tikv_cli(args);
        assert_eq!(output.status.code(), Some(1), "args: {:?}", args);
        assert!(!output.stderr.is_empty());
    }
}

#[test]
fn test_invalid_configuration_exits_one() {
    let output = tikv_cli(&["-k", "tenant", "-a", "v1", "get", "k"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("new client:"), "stderr: {}", stderr);
    assert!(output.stdout.is_empty());
}

#[test]
fn test_unreachable_pd_exits_one() {
    let output = tikv_cli(&[
        "-h",
        "127.0.0.1",
        "-p",
        "1",
        "--connect-timeout",
        "3",
        "get",
        "k",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("new client:"), "stderr: {}", stderr);
}
