use std::process::Command;
use tempfile::TempDir;

fn blendyard(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_blendyard"));
    cmd.current_dir(dir).env_remove("BLENDYARD_CONFIG");
    cmd
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();

    let output = blendyard(temp_dir.path())
        .arg("init")
        .output()
        .expect("Failed to run init command");
    assert!(output.status.success());

    let config_path = temp_dir.path().join(".blendyard/settings.toml");
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[general]"));
    assert!(content.contains("[watchdog]"));
    assert!(content.contains("delta_throttle = 2.0"));

    // A second init without --force refuses to overwrite
    let output = blendyard(temp_dir.path()).arg("init").output().unwrap();
    assert!(!output.status.success());

    let output = blendyard(temp_dir.path())
        .args(["init", "--force"])
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn test_config_command_reads_project_settings() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join(".blendyard");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("settings.toml"),
        r#"
version = 2

[watchdog]
delta_throttle = 5.5
"#,
    )
    .unwrap();

    let output = blendyard(temp_dir.path())
        .arg("config")
        .output()
        .expect("Failed to run config command");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version = 2"));
    assert!(stdout.contains("delta_throttle = 5.5"));
}

#[test]
fn test_config_command_accepts_legacy_json() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("legacy.json"),
        r#"{
            "general": { "blender_exe": "/opt/blender/blender" },
            "watchdog": { "delta_throttle": 3, "verbose": 1 }
        }"#,
    )
    .unwrap();

    let output = blendyard(temp_dir.path())
        .args(["config", "--json", "--config", "legacy.json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        value["general"]["converter_executable"],
        "/opt/blender/blender"
    );
    assert_eq!(value["watchdog"]["delta_throttle"], 3.0);
    assert_eq!(value["watchdog"]["verbose"], true);
}

#[test]
fn test_missing_explicit_config_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = blendyard(temp_dir.path())
        .args(["config", "--config", "nope.toml"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Configuration file not found"));
}

#[test]
fn test_convert_rejects_non_blend_file() {
    let temp_dir = TempDir::new().unwrap();

    let output = blendyard(temp_dir.path())
        .args(["convert", "--file", "readme.md"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("A .blend file must be provided"));
}
