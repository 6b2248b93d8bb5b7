//! E2E tests for persistent configuration
//!
//! Tests save/load through real files, fallback to defaults on missing or
//! corrupt files, and conversion into stream parameters.

use mysynth::config::AppConfig;

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = AppConfig {
        input_device: Some("USB Audio Device".to_string()),
        output_device: Some("bcm2835 Headphones".to_string()),
        sample_rate: 48000,
        channels: 1,
        block_frames: 512,
    };
    config.save(&path).unwrap();
    assert!(path.exists());

    let loaded = AppConfig::load_from(&path);
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = AppConfig::load_from(&dir.path().join("absent.json"));
    assert_eq!(loaded, AppConfig::default());
}

#[test]
fn test_corrupt_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert_eq!(AppConfig::load_from(&path), AppConfig::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"output_device": "HDMI", "block_frames": 256}"#).unwrap();

    let loaded = AppConfig::load_from(&path);
    assert_eq!(loaded.input_device, None);
    assert_eq!(loaded.output_device.as_deref(), Some("HDMI"));
    assert_eq!(loaded.sample_rate, 44100);
    assert_eq!(loaded.channels, 2);
    assert_eq!(loaded.block_frames, 256);
}

#[test]
fn test_saved_config_drives_stream_params() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    AppConfig {
        sample_rate: 22050,
        channels: 1,
        block_frames: 441,
        ..AppConfig::default()
    }
    .save(&path)
    .unwrap();

    let params = AppConfig::load_from(&path).stream_params().unwrap();
    assert_eq!(params.sample_rate, 22050);
    assert_eq!(params.block_bytes(), 882);
}

#[test]
fn test_out_of_range_rate_is_rejected() {
    let config = AppConfig {
        sample_rate: 1000,
        ..AppConfig::default()
    };
    let err = config.stream_params().unwrap_err();
    assert!(err.to_string().contains("1000"));
}

#[test]
fn test_oversized_block_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"block_frames": 4000000000}"#).unwrap();

    let err = AppConfig::load_from(&path).stream_params().unwrap_err();
    assert!(err.to_string().starts_with("Block too large"));
}
