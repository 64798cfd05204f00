//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use epd_matcher::error::MatcherError;
use epd_matcher::records;
use std::path::Path;
use tempfile::tempdir;

/// 存在しない入力ファイル
#[test]
fn test_load_nonexistent_document() {
    let result = records::load_document(Path::new("/nonexistent/path/12345/input.json"));
    assert!(matches!(result, Err(MatcherError::FileNotFound(_))));
}

/// 壊れたJSON
#[test]
fn test_load_invalid_json() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("input.json");
    std::fs::write(&path, "{ invalid").expect("Failed to write");

    let result = records::load_document(&path);
    assert!(matches!(result, Err(MatcherError::JsonParse(_))));
}

/// MatcherErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        MatcherError::Config("テスト設定エラー".to_string()),
        MatcherError::MissingSetting("ENDPOINT_URL"),
        MatcherError::Http("接続拒否".to_string()),
        MatcherError::HttpStatus {
            status: 503,
            body: "unavailable".to_string(),
        },
        MatcherError::Auth("トークンなし".to_string()),
        MatcherError::EmptyCatalog,
        MatcherError::ApiParse("不正なJSON".to_string()),
        MatcherError::FileNotFound("input.json".to_string()),
        MatcherError::InvalidInput("グループ数不一致".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// 必須設定エラーのメッセージ確認
#[test]
fn test_missing_setting_message() {
    let err = MatcherError::MissingSetting("AZURE_OPENAI_API_KEY");
    let display = format!("{}", err);

    assert!(display.contains("AZURE_OPENAI_API_KEY"));
    assert!(display.contains("config.json"));
}

/// 設定系と上流系の分類
#[test]
fn test_error_classification() {
    assert!(MatcherError::MissingSetting("ENDPOINT_URL").is_configuration());
    assert!(!MatcherError::MissingSetting("ENDPOINT_URL").is_upstream());

    assert!(MatcherError::EmptyCatalog.is_upstream());
    assert!(MatcherError::HttpStatus {
        status: 401,
        body: String::new()
    }
    .is_upstream());
    assert!(!MatcherError::FileNotFound("x".into()).is_upstream());
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: MatcherError = io_err.into();

    assert!(matches!(err, MatcherError::Io(_)));
    let display = format!("{}", err);
    assert!(display.contains("IO"));
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: MatcherError = json_err.into();

    assert!(matches!(err, MatcherError::JsonParse(_)));
}

/// common::Errorからの変換（透過的）
#[test]
fn test_common_error_conversion() {
    let common_err = epd_matcher_common::Error::Config("閾値エラー".to_string());
    let err: MatcherError = common_err.into();

    assert!(matches!(err, MatcherError::Common(_)));
    assert!(format!("{}", err).contains("閾値エラー"));
}
