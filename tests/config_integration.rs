//! Configuration system integration tests for Darshan.
//!
//! Tests the load, save and migration paths of the configuration system
//! using temporary files to avoid affecting the real config.

use darshan_lib::config::{self, Config, OutputKind};
use std::fs;
use tempfile::TempDir;

// =============================================================================
// Load / Save
// =============================================================================

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.json");

    let config = config::load_from_path(&path).expect("Failed to load config");
    assert_eq!(config, Config::default());
    assert!(!path.exists(), "loading must not create the file");
}

#[test]
fn test_save_and_reload() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.playback.slide_delay_ms = 4000;
    config.playback.output = OutputKind::Speaker;
    config.voices.meaning = "Aoede".to_string();
    config.narration.enabled = false;

    config::save_to_path(&config, &path).expect("Failed to save config");
    let loaded = config::load_from_path(&path).expect("Failed to load config");

    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"version": 2, "voices": {"ui": "Fenrir"}}"#).unwrap();

    let config = config::load_from_path(&path).expect("Failed to load config");

    assert_eq!(config.voices.ui, "Fenrir");
    assert_eq!(config.voices.sanskrit, "Kore");
    assert_eq!(config.playback.slide_delay_ms, 7000);
}

#[test]
fn test_invalid_json_is_an_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let err = config::load_from_path(&path).unwrap_err();
    assert!(err.contains("Failed to parse config"));
}

// =============================================================================
// Migrations
// =============================================================================

#[test]
fn test_old_config_is_migrated_and_written_back() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"version": 1, "playback": {"slide_delay_ms": 7, "channels": 0}}"#,
    )
    .unwrap();

    let config = config::load_from_path(&path).expect("Failed to load config");
    assert_eq!(config.version, 2);
    assert_eq!(config.playback.slide_delay_ms, 7000);
    assert_eq!(config.playback.channels, 1);

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["version"], 2);
    assert_eq!(on_disk["playback"]["slide_delay_ms"], 7000);
}

#[test]
fn test_unknown_future_version_is_kept() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"version": 9}"#).unwrap();

    // Nothing to migrate forward to; the file is read as is
    let config = config::load_from_path(&path).expect("Failed to load config");
    assert_eq!(config.version, 9);
}

#[test]
fn test_legacy_max_retries_key_is_read_as_attempts() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"version": 2, "narration": {"max_retries": 5}}"#).unwrap();

    let config = config::load_from_path(&path).expect("Failed to load config");
    assert_eq!(config.narration.max_attempts, 5);
}
