//! LLMゲートウェイ
//!
//! パイプラインはこのトレイト越しにLLMを呼ぶ。テストでは台本どおりに返す実装を差し込む。

mod azure;

pub use azure::{is_reasoning_model, AzureChatGateway};

use thiserror::Error;

/// 失敗の種類（レポート集計に使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    Transport,
    Timeout,
    Status(u16),
    EmptyContent,
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "通信"),
            Self::Timeout => write!(f, "タイムアウト"),
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::EmptyContent => write!(f, "空の応答"),
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("LLM呼び出しエラー（{kind}）: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 再試行すべき失敗か（通信・タイムアウト・429・5xx）
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            GatewayErrorKind::Transport | GatewayErrorKind::Timeout => true,
            GatewayErrorKind::Status(code) => code == 429 || code >= 500,
            GatewayErrorKind::EmptyContent => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            GatewayErrorKind::Timeout
        } else if let Some(status) = e.status() {
            GatewayErrorKind::Status(status.as_u16())
        } else {
            GatewayErrorKind::Transport
        };
        Self::new(kind, e.to_string())
    }
}

/// チャット補完1回分
pub trait ChatGateway {
    fn complete(&self, system: &str, user: &str) -> Result<String, GatewayError>;
}

impl<G: ChatGateway + ?Sized> ChatGateway for Box<G> {
    fn complete(&self, system: &str, user: &str) -> Result<String, GatewayError> {
        (**self).complete(system, user)
    }
}
