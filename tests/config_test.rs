//! 設定ファイルのテスト

use epd_matcher::config::Config;
use std::collections::HashMap;
use tempfile::tempdir;

/// 存在しないファイルは既定値
#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempdir().expect("Failed to create temp dir");
    let config = Config::load_from(&dir.path().join("config.json")).expect("load");

    assert_eq!(config.matching.batch_size, 10);
    assert_eq!(config.thresholds.min_confidence, 25);
    assert!(config.llm.endpoint.is_none());
}

/// 部分的な設定ファイル（不足分は既定値）
#[test]
fn test_load_partial_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{
            "llm": {"endpoint": "https://llm.example.com", "deployment": "o3-mini"},
            "matching": {"batchSize": 4, "useValidation": false},
            "thresholds": {"minConfidence": 40}
        }"#,
    )
    .expect("Failed to write");

    let config = Config::load_from(&path).expect("load");
    assert_eq!(config.llm.endpoint.as_deref(), Some("https://llm.example.com"));
    assert_eq!(config.llm.deployment, "o3-mini");
    assert_eq!(config.llm.max_retries, 3);
    assert_eq!(config.matching.batch_size, 4);
    assert!(!config.matching.use_validation);
    assert!(config.matching.use_prefilter);
    assert_eq!(config.thresholds.min_confidence, 40);
    assert_eq!(config.thresholds.layer_mismatch_cap, 45);
}

/// 環境変数はファイルの値より優先
#[test]
fn test_env_overrides_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"matching": {"batchSize": 4}}"#).expect("Failed to write");

    let mut config = Config::load_from(&path).expect("load");
    let env: HashMap<&str, &str> = [("EPD_BATCH_SIZE", "7"), ("EPD_USE_GLOSSAR_FILTER", "off")].into();
    config.apply_env(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.matching.batch_size, 7);
    assert!(!config.matching.use_prefilter);
}

/// 設定の保存形式で読み戻せる
#[test]
fn test_serialized_config_reloads() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.catalog.filter_labels = vec!["Asphalt".into()];
    config.catalog.use_filter_labels = true;
    std::fs::write(&path, serde_json::to_string_pretty(&config).expect("serialize")).expect("write");

    let loaded = Config::load_from(&path).expect("load");
    assert_eq!(loaded.catalog.active_labels(), vec!["Asphalt"]);
}

/// 壊れた設定ファイルはエラー
#[test]
fn test_invalid_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").expect("Failed to write");

    assert!(Config::load_from(&path).is_err());
}
