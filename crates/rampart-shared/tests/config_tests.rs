//! Settings load/save behaviour against real files.

use rampart_shared::config::{Settings, CONFIG_FILE_NAME};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn config_path(dir: &TempDir) -> PathBuf {
    dir.path().join(CONFIG_FILE_NAME)
}

#[test]
fn test_missing_key_takes_default_and_keeps_others() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(
        &path,
        r#"{
  "auto_start": false,
  "local_backup_path": "/mnt/usb/backups",
  "max_backup_size_gb": 12,
  "refresh_interval": 45,
  "theme": "dark"
}"#,
    )
    .unwrap();

    let settings = Settings::load(&path);
    assert_eq!(settings.max_snapshots, 10);
    assert!(!settings.auto_start);
    assert_eq!(settings.local_backup_path, PathBuf::from("/mnt/usb/backups"));
    assert_eq!(settings.max_backup_size_gb, 12);
    assert_eq!(settings.refresh_interval, 45);
    assert_eq!(settings.theme, "dark");
}

#[test]
fn test_unknown_keys_survive_save() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(&path, r#"{"theme": "modern", "window_geometry": "1000x700", "beta": {"x": 1}}"#)
        .unwrap();

    let mut settings = Settings::load(&path);
    assert_eq!(settings.extra.len(), 2);
    settings.max_snapshots = 3;
    settings.save(&path).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["window_geometry"], "1000x700");
    assert_eq!(raw["beta"]["x"], 1);
    assert_eq!(raw["max_snapshots"], 3);
}

#[test]
fn test_missing_file_writes_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

    let settings = Settings::load(&path);
    assert_eq!(settings, Settings::default());
    assert!(path.exists());

    let reloaded = Settings::load_from_path(&path).unwrap();
    assert_eq!(reloaded.refresh_interval, settings.refresh_interval);
}

#[test]
fn test_malformed_file_falls_back_without_overwriting() {
    let dir = TempDir::new().unwrap();
    let path = config_path(&dir);
    fs::write(&path, "{ this is not json").unwrap();

    let settings = Settings::load(&path);
    assert_eq!(settings.max_backup_size_gb, 4);
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ this is not json");
}
