use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatcherError {
    // ---- 設定（起動時に致命的）
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("必須設定がありません: {0}（環境変数または ~/.config/epd-matcher/config.json で設定してください）")]
    MissingSetting(&'static str),

    // ---- 上流サービス（キャッシュ準備中は致命的）
    #[error("HTTP通信エラー: {0}")]
    Http(String),

    #[error("HTTPステータスエラー: {status} {body}")]
    HttpStatus { status: u16, body: String },

    #[error("認証エラー: {0}")]
    Auth(String),

    #[error("カタログが空です（照合対象のEPDがありません）")]
    EmptyCatalog,

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    // ---- ローカル
    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("入力データが不正: {0}")]
    InvalidInput(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] epd_matcher_common::Error),
}

impl MatcherError {
    /// 設定不備
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::MissingSetting(_) | Self::Common(_))
    }

    /// 上流サービス（通信・認証・応答）の失敗
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::HttpStatus { .. } | Self::Auth(_) | Self::EmptyCatalog | Self::ApiParse(_)
        )
    }
}

impl From<reqwest::Error> for MatcherError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            MatcherError::HttpStatus {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            MatcherError::Http(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, MatcherError>;
