//! Azure OpenAI チャット補完

use super::{ChatGateway, GatewayError, GatewayErrorKind};
use crate::config::LlmConfig;
use crate::error::{MatcherError, Result};
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;

const REASONING_MAX_TOKENS: u32 = 16000;
const STANDARD_MAX_TOKENS: u32 = 4000;
const STANDARD_TEMPERATURE: f64 = 0.2;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// 推論モデル（temperature非対応）かどうかをデプロイ名から判定
pub fn is_reasoning_model(deployment: &str) -> bool {
    let name = deployment.to_lowercase();
    ["gpt-5", "o1", "o3", "o4"].iter().any(|p| name.contains(p))
}

pub struct AzureChatGateway {
    http: reqwest::blocking::Client,
    url: String,
    api_key: String,
    reasoning: bool,
    max_retries: u32,
    backoff: Duration,
}

impl AzureChatGateway {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(MatcherError::MissingSetting("ENDPOINT_URL"))?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(MatcherError::MissingSetting("AZURE_OPENAI_API_KEY"))?;

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| MatcherError::Http(format!("HTTPクライアントの作成に失敗: {}", e)))?;

        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            config.deployment,
            config.api_version
        );

        Ok(Self {
            http,
            url,
            api_key,
            reasoning: config
                .reasoning
                .unwrap_or_else(|| is_reasoning_model(&config.deployment)),
            max_retries: config.max_retries,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// 再試行間隔（試行回数に比例して伸びる）
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn is_reasoning(&self) -> bool {
        self.reasoning
    }

    /// リクエスト本文
    pub fn request_body(&self, system: &str, user: &str) -> Value {
        let mut body = json!({
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        if self.reasoning {
            body["max_completion_tokens"] = json!(REASONING_MAX_TOKENS);
        } else {
            body["max_tokens"] = json!(STANDARD_MAX_TOKENS);
            body["temperature"] = json!(STANDARD_TEMPERATURE);
        }
        body
    }

    fn send(&self, body: &Value) -> std::result::Result<String, GatewayError> {
        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(GatewayError::new(GatewayErrorKind::Status(status.as_u16()), text));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::new(GatewayErrorKind::EmptyContent, format!("JSON解析エラー: {}", e)))?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(GatewayError::new(GatewayErrorKind::EmptyContent, "choices[0].message.content が空です"));
        }
        Ok(content.to_string())
    }
}

impl ChatGateway for AzureChatGateway {
    fn complete(&self, system: &str, user: &str) -> std::result::Result<String, GatewayError> {
        let body = self.request_body(system, user);
        let mut attempt = 0;
        loop {
            match self.send(&body) {
                Ok(content) => return Ok(content),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, max = self.max_retries, error = %e, "LLM call failed, retrying");
                    thread::sleep(self.backoff * attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(deployment: &str) -> LlmConfig {
        LlmConfig {
            endpoint: Some("https://example.openai.azure.com/".into()),
            api_key: Some("key".into()),
            deployment: deployment.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_reasoning_detection() {
        assert!(is_reasoning_model("gpt-5-mini"));
        assert!(is_reasoning_model("O3-mini"));
        assert!(is_reasoning_model("o4-mini"));
        assert!(!is_reasoning_model("gpt-4o-mini"));
        assert!(!is_reasoning_model("gpt-4.1"));
    }

    #[test]
    fn test_reasoning_override() {
        let mut cfg = config("gpt-4o-mini");
        cfg.reasoning = Some(true);
        assert!(AzureChatGateway::new(&cfg).unwrap().is_reasoning());
    }

    #[test]
    fn test_request_body_standard() {
        let gateway = AzureChatGateway::new(&config("gpt-4o-mini")).unwrap();
        let body = gateway.request_body("sys", "user");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["temperature"], 0.2);
        assert!(body.get("max_completion_tokens").is_none());
        assert_eq!(body["messages"][1]["content"], "user");
    }

    #[test]
    fn test_request_body_reasoning() {
        let gateway = AzureChatGateway::new(&config("gpt-5")).unwrap();
        let body = gateway.request_body("sys", "user");
        assert_eq!(body["max_completion_tokens"], 16000);
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_missing_endpoint() {
        let mut cfg = config("gpt-4o-mini");
        cfg.endpoint = None;
        assert!(matches!(
            AzureChatGateway::new(&cfg),
            Err(MatcherError::MissingSetting("ENDPOINT_URL"))
        ));
    }

    #[test]
    fn test_url() {
        let gateway = AzureChatGateway::new(&config("gpt-4o-mini")).unwrap();
        assert_eq!(
            gateway.url,
            "https://example.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-08-01-preview"
        );
    }
}
