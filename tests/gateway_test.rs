//! Azure OpenAI ゲートウェイのテスト（httpmock）

use epd_matcher::config::LlmConfig;
use epd_matcher::gateway::{AzureChatGateway, ChatGateway, GatewayErrorKind};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

const PATH: &str = "/openai/deployments/{}/chat/completions";

fn config(server: &MockServer, deployment: &str) -> LlmConfig {
    LlmConfig {
        endpoint: Some(server.base_url()),
        api_key: Some("test-key".into()),
        deployment: deployment.into(),
        timeout_seconds: 5,
        max_retries: 2,
        ..Default::default()
    }
}

fn gateway(server: &MockServer, deployment: &str) -> AzureChatGateway {
    AzureChatGateway::new(&config(server, deployment))
        .expect("Failed to create gateway")
        .with_backoff(Duration::ZERO)
}

fn path(deployment: &str) -> String {
    PATH.replace("{}", deployment)
}

fn completion(content: &str) -> serde_json::Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

/// 標準モデル: max_tokens と temperature を送る
#[test]
fn test_standard_model_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(path("gpt-4o-mini"))
            .query_param("api-version", "2024-08-01-preview")
            .header("api-key", "test-key")
            .json_body(json!({
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "prompt"}
                ],
                "max_tokens": 4000,
                "temperature": 0.2
            }));
        then.status(200).json_body(completion("  {\"matches\": []}\n"));
    });

    let content = gateway(&server, "gpt-4o-mini")
        .complete("sys", "prompt")
        .expect("completion");

    mock.assert();
    assert_eq!(content, "{\"matches\": []}");
}

/// 推論モデル: max_completion_tokens のみ
#[test]
fn test_reasoning_model_request() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(path("gpt-5-mini"))
            .json_body(json!({
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "prompt"}
                ],
                "max_completion_tokens": 16000
            }));
        then.status(200).json_body(completion("{\"results\": []}"));
    });

    let result = gateway(&server, "gpt-5-mini").complete("sys", "prompt");

    mock.assert();
    assert!(result.is_ok());
}

/// 5xx は再試行し、上限を超えたら Status で失敗
#[test]
fn test_server_error_retried_then_fails() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(path("gpt-4o-mini"));
        then.status(503).body("overloaded");
    });

    let err = gateway(&server, "gpt-4o-mini")
        .complete("sys", "prompt")
        .unwrap_err();

    mock.assert_calls(3);
    assert_eq!(err.kind, GatewayErrorKind::Status(503));
    assert!(err.message.contains("overloaded"));
}

/// 4xx は再試行しない
#[test]
fn test_client_error_not_retried() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(path("gpt-4o-mini"));
        then.status(400).body("bad request");
    });

    let err = gateway(&server, "gpt-4o-mini")
        .complete("sys", "prompt")
        .unwrap_err();

    mock.assert_calls(1);
    assert_eq!(err.kind, GatewayErrorKind::Status(400));
}

/// 空の content は EmptyContent
#[test]
fn test_empty_content() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(path("gpt-4o-mini"));
        then.status(200).json_body(json!({"choices": [{"message": {"content": null}}]}));
    });

    let err = gateway(&server, "gpt-4o-mini")
        .complete("sys", "prompt")
        .unwrap_err();
    assert_eq!(err.kind, GatewayErrorKind::EmptyContent);
}

/// 接続できない場合は Transport
#[test]
fn test_transport_failure() {
    let cfg = LlmConfig {
        endpoint: Some("http://127.0.0.1:9".into()),
        api_key: Some("test-key".into()),
        max_retries: 0,
        timeout_seconds: 2,
        ..Default::default()
    };
    let err = AzureChatGateway::new(&cfg)
        .expect("Failed to create gateway")
        .complete("sys", "prompt")
        .unwrap_err();

    assert!(matches!(err.kind, GatewayErrorKind::Transport | GatewayErrorKind::Timeout));
}
