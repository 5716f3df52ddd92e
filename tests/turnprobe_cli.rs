use base64::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

const VALID_CONFIG: &str = r#"
name = "turnprobe-cli-test"

[source]
env_var = "TURNPROBE_CLI_TEST_CONFIG"
use_fallback = false

[probe]
gather_timeout_ms = 5000
variants = ["full", "turn-only"]

[observability]
filter_level = "warn"
"#;

const WARNING_ONLY_CONFIG: &str = r#"
[probe]
gather_timeout_ms = 50
poll_interval_ms = 100
"#;

const INVALID_VALUES_CONFIG: &str = r#"
[probe]
gather_timeout_ms = 0

[observability.log]
output = "syslog"
"#;

fn write_config(dir: &Path, file_name: &str, content: &str) -> PathBuf {
    let config_path = dir.join(file_name);
    fs::write(&config_path, content).expect("write config");
    config_path
}

fn run_turnprobe(args: &[&str], current_dir: &Path) -> Output {
    Command::new(PathBuf::from(env!("CARGO_BIN_EXE_turnprobe")))
        .args(args)
        .current_dir(current_dir)
        .env_remove("RTC_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("run turnprobe command")
}

#[test]
fn check_command_accepts_explicit_valid_config() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config_path = write_config(temp.path(), "valid.toml", VALID_CONFIG);
    let output = run_turnprobe(
        &["check", config_path.to_str().expect("utf8 path")],
        temp.path(),
    );

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn check_command_finds_default_config_in_current_directory() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_config(temp.path(), "turnprobe.toml", VALID_CONFIG);
    let output = run_turnprobe(&["check"], temp.path());

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn check_command_passes_with_warnings_only() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config_path = write_config(temp.path(), "warn.toml", WARNING_ONLY_CONFIG);
    let output = run_turnprobe(
        &["check", config_path.to_str().expect("utf8 path")],
        temp.path(),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("Warning:"), "unexpected stderr: {stderr}");
}

#[test]
fn check_command_rejects_invalid_values() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config_path = write_config(temp.path(), "invalid.toml", INVALID_VALUES_CONFIG);
    let output = run_turnprobe(
        &["check", config_path.to_str().expect("utf8 path")],
        temp.path(),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(
        stderr.contains("gather_timeout_ms") && stderr.contains("syslog"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn check_command_fails_for_invalid_toml() {
    let temp = tempfile::tempdir().expect("temp dir");
    let bad_path = write_config(temp.path(), "bad.toml", "name = \"broken\"\n[probe\n");
    let output = run_turnprobe(&["check", bad_path.to_str().expect("utf8 path")], temp.path());
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(stderr.contains("parse"), "unexpected stderr: {stderr}");
}

#[test]
fn check_command_fails_when_no_default_config_exists() {
    let temp = tempfile::tempdir().expect("temp dir");
    let output = run_turnprobe(&["check"], temp.path());
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(
        stderr.contains("No configuration file found"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn explicit_missing_config_is_an_error() {
    let temp = tempfile::tempdir().expect("temp dir");
    let missing = temp.path().join("missing.toml");
    let output = run_turnprobe(
        &["--config", missing.to_str().expect("utf8 path"), "run"],
        temp.path(),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(
        stderr.contains("Config file not found"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn run_fails_when_no_source_is_usable() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config_path = write_config(temp.path(), "valid.toml", VALID_CONFIG);
    let missing_json = temp.path().join("absent.json");
    let output = run_turnprobe(
        &[
            "--config",
            config_path.to_str().expect("utf8 path"),
            "run",
            "--source-file",
            missing_json.to_str().expect("utf8 path"),
        ],
        temp.path(),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(output.stdout.is_empty(), "no report expected on stdout");
    assert!(
        stderr.contains("No usable ICE configuration"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn convert_command_prints_env_assignment() {
    let temp = tempfile::tempdir().expect("temp dir");
    let input = temp.path().join("xirsys-config.json");
    fs::write(
        &input,
        r#"{
    "iceServers": [
        { "urls": "stun:stun.example.org:3478" },
        {
            "urls": ["turn:relay.example.org:3478?transport=udp"],
            "username": "user",
            "credential": "secret"
        }
    ]
}"#,
    )
    .expect("write json");

    let output = run_turnprobe(&["convert", "--env-var", "ICE_CONFIG"], temp.path());
    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.trim();
    let encoded = line
        .strip_prefix("ICE_CONFIG=\"")
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or_else(|| panic!("unexpected stdout: {stdout}"));

    let decoded = String::from_utf8(BASE64_STANDARD.decode(encoded).expect("base64")).expect("utf8");
    assert!(!decoded.contains('\n'), "json should be minified: {decoded}");
    let value: serde_json::Value = serde_json::from_str(&decoded).expect("json");
    assert_eq!(value["iceServers"][1]["username"], "user");
}

#[test]
fn convert_command_fails_for_missing_input() {
    let temp = tempfile::tempdir().expect("temp dir");
    let output = run_turnprobe(&["convert", "--input", "nope.json"], temp.path());
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(stderr.contains("Failed to read"), "unexpected stderr: {stderr}");
}

#[test]
fn convert_command_reports_each_problem_on_stderr() {
    let temp = tempfile::tempdir().expect("temp dir");
    let input = write_config(
        temp.path(),
        "missing-credentials.json",
        r#"{ "iceServers": [ { "urls": "turn:relay.example.org" } ] }"#,
    );
    let output = run_turnprobe(
        &["convert", "--input", input.to_str().expect("utf8 path")],
        temp.path(),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(output.stdout.is_empty(), "no assignment expected on stdout");
    assert!(
        stderr.contains("turn:relay.example.org requires username and credential"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn strict_run_fails_when_no_variant_applies() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config_path = write_config(temp.path(), "valid.toml", VALID_CONFIG);
    let source = write_config(
        temp.path(),
        "stun-only.json",
        r#"{ "iceServers": [ { "urls": "stun:stun.example.org:3478" } ] }"#,
    );
    let output = run_turnprobe(
        &[
            "--config",
            config_path.to_str().expect("utf8 path"),
            "run",
            "--source-file",
            source.to_str().expect("utf8 path"),
            "--variant",
            "turn-only",
            "--strict",
        ],
        temp.path(),
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "strict run with nothing tested should fail");
    assert!(stdout.contains("Tests passed: 0/0"), "unexpected stdout: {stdout}");
}
