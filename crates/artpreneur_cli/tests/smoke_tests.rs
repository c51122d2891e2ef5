//! CLI smoke tests: verify basic binary behavior.

use std::process::Command;

const SECRET: &str = "smoke-test-secret-long-enough-for-hs256";

fn cli_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_artpreneur"))
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("score"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("artpreneur"), "Expected binary name in --version output");
}

#[test]
fn test_token_requires_secret() {
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_artpreneur_config_12345.toml")
        .arg("token")
        .arg("--user")
        .arg("6f1c1f5e-3b44-4c1e-9a57-1d2b3c4d5e6f")
        .env_remove("ARTPRENEUR_JWT_SECRET")
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
}

#[test]
fn test_token_prints_jwt() {
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_artpreneur_config_12345.toml")
        .arg("token")
        .arg("--user")
        .arg("6f1c1f5e-3b44-4c1e-9a57-1d2b3c4d5e6f")
        .env("ARTPRENEUR_JWT_SECRET", SECRET)
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim().split('.').count(), 3, "Expected a three-part JWT");
}

#[test]
fn test_score_on_fresh_database() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("cli.db");
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_artpreneur_config_12345.toml")
        .arg("score")
        .arg("--user")
        .arg("6f1c1f5e-3b44-4c1e-9a57-1d2b3c4d5e6f")
        .env("ARTPRENEUR_DB_PATH", &db)
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let scores: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(scores["overall_score"], 25);
    assert_eq!(scores["learning_engagement_score"], 50);
}

#[test]
fn test_score_rejects_invalid_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("configured.db");
    let config = dir.path().join("artpreneur.toml");
    std::fs::write(
        &config,
        format!(
            "[database]\npath = {:?}\n\n[scoring.weights]\nproductivity = 0.9\n",
            db.display().to_string()
        ),
    )
    .unwrap();

    let output = cli_bin()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("score")
        .arg("--user")
        .arg("6f1c1f5e-3b44-4c1e-9a57-1d2b3c4d5e6f")
        .env_remove("ARTPRENEUR_DB_PATH")
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid [scoring] section"), "stderr: {stderr}");
    assert!(!db.exists());
    assert!(!dir.path().join("artpreneur.db").exists());
}
