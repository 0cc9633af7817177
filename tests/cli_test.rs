use std::process::Command;
use tempfile::TempDir;

fn labelwatch(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_labelwatch"));
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();

    let output = labelwatch(&temp_dir)
        .arg("init")
        .output()
        .expect("Failed to run init command");

    assert!(output.status.success());

    let config_path = temp_dir.path().join(".labelwatch/settings.toml");
    assert!(config_path.exists());

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[watch]"));
    assert!(content.contains("[retry]"));
    assert!(content.contains("max_retries = 3"));

    // Second init without --force refuses
    let output = labelwatch(&temp_dir).arg("init").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_config_command_reads_workspace_settings() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join(".labelwatch");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("settings.toml"),
        "[retry]\nmax_retries = 7\n\n[stability]\nsamples = 4\n",
    )
    .unwrap();

    let output = labelwatch(&temp_dir)
        .arg("config")
        .output()
        .expect("Failed to run config command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("max_retries = 7"));
    assert!(stdout.contains("samples = 4"));
}

#[test]
fn test_status_json_counts_folders() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("Processed")).unwrap();
    std::fs::create_dir_all(root.join("Retry")).unwrap();
    std::fs::write(root.join("new.jpg"), b"x").unwrap();
    std::fs::write(root.join("Processed/old.jpg"), b"x").unwrap();
    std::fs::write(root.join("Retry/bad__retry3.jpg"), b"x").unwrap();
    std::fs::write(root.join("Retry/bad__retry3.jpg.stuck"), b"").unwrap();
    // Final attempt still pending: scheduled, not stuck
    std::fs::write(root.join("Retry/last__retry3.jpg"), b"x").unwrap();

    let output = labelwatch(&temp_dir)
        .args(["status", "--json"])
        .env("LW_WATCH__ROOT", root)
        .output()
        .unwrap();

    assert!(output.status.success());
    let inventory: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(inventory["pending"], 1);
    assert_eq!(inventory["processed"], 1);
    assert_eq!(inventory["retry_scheduled"], 1);
    assert_eq!(inventory["stuck"][0], "bad__retry3.jpg");
}

#[test]
fn test_watch_fails_fast_on_missing_root() {
    let temp_dir = TempDir::new().unwrap();

    let output = labelwatch(&temp_dir)
        .args(["watch", "--root", "does-not-exist"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_unlock_all_removes_markers() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::write(root.join("a.jpg"), b"x").unwrap();
    std::fs::write(root.join("a.jpg.lock"), b"").unwrap();

    let output = labelwatch(&temp_dir)
        .args(["unlock", "--all"])
        .env("LW_WATCH__ROOT", root)
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(root.join("a.jpg").exists());
    assert!(!root.join("a.jpg.lock").exists());
}
