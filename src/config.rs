//! 設定
//!
//! 読み込み順: `~/.config/epd-matcher/config.json` → `.env` → 環境変数（個別項目を上書き）。
//! 環境変数名は既存デプロイとの互換のためそのまま使う。

use crate::error::{MatcherError, Result};
use epd_matcher_common::ValidationThresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// LLM（Azure OpenAI）の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: String,
    pub api_version: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// 推論モデルかどうか（未指定ならデプロイ名から判定）
    pub reasoning: Option<bool>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: "gpt-4o-mini".into(),
            api_version: "2024-08-01-preview".into(),
            timeout_seconds: 240,
            max_retries: 3,
            reasoning: None,
        }
    }
}

/// カタログAPIの設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub group_value: Option<String>,
    pub use_filter_labels: bool,
    pub filter_labels: Vec<String>,
}

impl CatalogConfig {
    /// 一覧取得時に使うラベル（無効なら空）
    pub fn active_labels(&self) -> Vec<String> {
        if self.use_filter_labels {
            self.filter_labels.clone()
        } else {
            Vec::new()
        }
    }
}

/// 照合パイプラインの設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchingConfig {
    /// キャッシュするEPDの上限（プロンプトに載る最大数）
    pub max_epd_in_prompt: usize,
    pub parallel_workers: usize,
    pub max_results: usize,
    pub detail_matching: bool,
    pub batch_mode: bool,
    pub batch_size: usize,
    pub use_prefilter: bool,
    pub filter_max_per_material: usize,
    pub use_validation: bool,
    pub use_glossary: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_epd_in_prompt: 200,
            parallel_workers: 10,
            max_results: 10,
            detail_matching: false,
            batch_mode: true,
            batch_size: 10,
            use_prefilter: true,
            filter_max_per_material: 100,
            use_validation: true,
            use_glossary: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub catalog: CatalogConfig,
    pub matching: MatchingConfig,
    pub thresholds: ValidationThresholds,
}

/// 真偽値の環境変数（true/1/yes/ja/on）
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "ja" | "on" => Some(true),
        "false" | "0" | "no" | "nein" | "off" => Some(false),
        _ => None,
    }
}

/// 秘密情報を伏せ字にする
pub fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".into()
    } else {
        format!("{}****", visible)
    }
}

impl Config {
    /// 設定ファイル → .env → 環境変数 の順に読み込む
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        dotenvy::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 設定ファイルのみ読み込む（存在しなければ既定値）
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| MatcherError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("epd-matcher").join("config.json"))
    }

    /// 環境変数で上書き
    ///
    /// `get` は変数名から値を返す関数（テストでは HashMap を渡す）。
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |key: &str| text(key).and_then(|v| parse_bool(&v));
        let number = |key: &str| text(key).and_then(|v| v.parse::<u64>().ok());

        // LLM
        let llm = &mut self.llm;
        if let Some(v) = text("ENDPOINT_URL") {
            llm.endpoint = Some(v);
        }
        if let Some(v) = text("AZURE_OPENAI_API_KEY") {
            llm.api_key = Some(v);
        }
        if let Some(v) = text("DEPLOYMENT_NAME") {
            llm.deployment = v;
        }
        if let Some(v) = text("AZURE_API_VERSION") {
            llm.api_version = v;
        }
        if let Some(v) = number("AZURE_TIMEOUT") {
            llm.timeout_seconds = v;
        }
        if let Some(v) = number("AZURE_MAX_RETRIES") {
            llm.max_retries = v as u32;
        }
        if let Some(v) = flag("LLM_REASONING_MODEL") {
            llm.reasoning = Some(v);
        }

        // カタログ
        let catalog = &mut self.catalog;
        if let Some(v) = text("ONLINE_EPD_API_BASE_URL") {
            catalog.base_url = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = text("ONLINE_EPD_API_USERNAME") {
            catalog.username = Some(v);
        }
        if let Some(v) = text("ONLINE_EPD_API_PASSWORD").or_else(|| text("ONLINE_EPD_API_PASSWORT")) {
            catalog.password = Some(v);
        }
        if let Some(v) = text("ONLINE_EPD_GROUP_VALUE") {
            catalog.group_value = Some(v);
        }
        if let Some(v) = flag("EPD_USE_FILTER_LABELS") {
            catalog.use_filter_labels = v;
        }
        if let Some(v) = text("EPD_FILTER_LABELS") {
            catalog.filter_labels = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // 照合
        let matching = &mut self.matching;
        if let Some(v) = number("PROMPT_MAX_EPD") {
            matching.max_epd_in_prompt = v as usize;
        }
        if let Some(v) = number("EPD_PARALLEL_WORKERS") {
            matching.parallel_workers = v as usize;
        }
        if let Some(v) = number("EPD_MAX_RESULTS") {
            matching.max_results = v as usize;
        }
        if let Some(v) = flag("EPD_USE_DETAIL_MATCHING") {
            matching.detail_matching = v;
        }
        if let Some(v) = flag("EPD_USE_BATCH_MODE") {
            matching.batch_mode = v;
        }
        if let Some(v) = number("EPD_BATCH_SIZE") {
            matching.batch_size = v as usize;
        }
        if let Some(v) = flag("EPD_USE_GLOSSAR_FILTER") {
            matching.use_prefilter = v;
        }
        if let Some(v) = number("EPD_FILTER_MAX_PER_MATERIAL") {
            matching.filter_max_per_material = v as usize;
        }
        if let Some(v) = flag("EPD_USE_CONFIDENCE_VALIDATION") {
            matching.use_validation = v;
        }
        if let Some(v) = flag("EPD_USE_GLOSSAR") {
            matching.use_glossary = v;
        }

        // 閾値
        let percent = |key: &str| number(key).map(|v| v.min(100) as u8);
        let thresholds = &mut self.thresholds;
        if let Some(v) = percent("EPD_MIN_CONFIDENCE") {
            thresholds.min_confidence = v;
        }
        if let Some(v) = percent("EPD_MAX_CONFIDENCE_EXCLUDED") {
            thresholds.excluded_cap = v;
        }
        if let Some(v) = percent("EPD_LAYER_MISMATCH_CAP") {
            thresholds.layer_mismatch_cap = v;
        }
        if let Some(v) = percent("EPD_LAYER_AND_TYPE_MISMATCH_CAP") {
            thresholds.layer_and_type_mismatch_cap = v;
        }
        if let Some(v) = percent("EPD_NO_PAVING_KEYWORD_CAP") {
            thresholds.no_paving_keyword_cap = v;
        }
    }

    /// 必須設定の確認（最初に欠けている項目を返す）
    pub fn validate(&self) -> Result<()> {
        let required: [(&'static str, &Option<String>); 5] = [
            ("ENDPOINT_URL", &self.llm.endpoint),
            ("AZURE_OPENAI_API_KEY", &self.llm.api_key),
            ("ONLINE_EPD_API_BASE_URL", &self.catalog.base_url),
            ("ONLINE_EPD_API_USERNAME", &self.catalog.username),
            ("ONLINE_EPD_API_PASSWORD", &self.catalog.password),
        ];
        for (name, value) in required {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                return Err(MatcherError::MissingSetting(name));
            }
        }

        if self.matching.batch_size == 0 {
            return Err(MatcherError::Config("batch_size は1以上にしてください".into()));
        }
        if self.matching.parallel_workers == 0 {
            return Err(MatcherError::Config("parallel_workers は1以上にしてください".into()));
        }
        self.thresholds.check()?;
        Ok(())
    }

    /// LLMの設定のみ確認（カタログ不要のコマンド向け）
    pub fn validate_catalog(&self) -> Result<()> {
        let required: [(&'static str, &Option<String>); 3] = [
            ("ONLINE_EPD_API_BASE_URL", &self.catalog.base_url),
            ("ONLINE_EPD_API_USERNAME", &self.catalog.username),
            ("ONLINE_EPD_API_PASSWORD", &self.catalog.password),
        ];
        for (name, value) in required {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                return Err(MatcherError::MissingSetting(name));
            }
        }
        Ok(())
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.llm.api_key = Some(key);
        self.save()
    }

    /// 表示用の行（秘密情報は伏せ字）
    pub fn display_lines(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "(未設定)".into());
        let secret = |v: &Option<String>| v.as_deref().map(mask).unwrap_or_else(|| "(未設定)".into());
        let m = &self.matching;
        let t = &self.thresholds;

        vec![
            format!("  LLMエンドポイント: {}", opt(&self.llm.endpoint)),
            format!("  LLM APIキー: {}", secret(&self.llm.api_key)),
            format!("  デプロイ名: {} (API {})", self.llm.deployment, self.llm.api_version),
            format!("  タイムアウト: {}秒 / リトライ: {}回", self.llm.timeout_seconds, self.llm.max_retries),
            format!("  カタログAPI: {}", opt(&self.catalog.base_url)),
            format!("  カタログユーザー: {}", opt(&self.catalog.username)),
            format!("  カタログパスワード: {}", secret(&self.catalog.password)),
            format!("  グループ: {}", opt(&self.catalog.group_value)),
            format!("  ラベル絞り込み: {} {:?}", self.catalog.use_filter_labels, self.catalog.filter_labels),
            format!("  プロンプト最大EPD数: {}", m.max_epd_in_prompt),
            format!("  並列数: {} / 最大結果数: {}", m.parallel_workers, m.max_results),
            format!("  バッチ: {} (サイズ {}) / 詳細: {}", m.batch_mode, m.batch_size, m.detail_matching),
            format!(
                "  プレフィルタ: {} (最大 {}件) / 検証: {} / 用語集: {}",
                m.use_prefilter, m.filter_max_per_material, m.use_validation, m.use_glossary
            ),
            format!(
                "  閾値: 最低 {} / 除外 {} / 層 {} / 層+種別 {} / 舗装語なし {}",
                t.min_confidence,
                t.excluded_cap,
                t.layer_mismatch_cap,
                t.layer_and_type_mismatch_cap,
                t.no_paving_keyword_cap
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn complete() -> Config {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("ENDPOINT_URL", "https://example.openai.azure.com"),
            ("AZURE_OPENAI_API_KEY", "secret-key"),
            ("ONLINE_EPD_API_BASE_URL", "https://epd.example.com/"),
            ("ONLINE_EPD_API_USERNAME", "user"),
            ("ONLINE_EPD_API_PASSWORT", "pw"),
        ]));
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.deployment, "gpt-4o-mini");
        assert_eq!(config.llm.timeout_seconds, 240);
        assert_eq!(config.matching.max_epd_in_prompt, 200);
        assert_eq!(config.matching.parallel_workers, 10);
        assert!(config.matching.batch_mode);
        assert!(!config.matching.detail_matching);
        assert_eq!(config.thresholds.min_confidence, 25);
        assert_eq!(config.thresholds.excluded_cap, 20);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("DEPLOYMENT_NAME", "gpt-5-mini"),
            ("EPD_USE_BATCH_MODE", "false"),
            ("EPD_USE_DETAIL_MATCHING", "JA"),
            ("EPD_MAX_RESULTS", "5"),
            ("EPD_MIN_CONFIDENCE", "30"),
            ("EPD_FILTER_LABELS", "Asphalt, Bitumen ,,"),
            ("EPD_USE_FILTER_LABELS", "1"),
        ]));
        assert_eq!(config.llm.deployment, "gpt-5-mini");
        assert!(!config.matching.batch_mode);
        assert!(config.matching.detail_matching);
        assert_eq!(config.matching.max_results, 5);
        assert_eq!(config.thresholds.min_confidence, 30);
        assert_eq!(config.catalog.active_labels(), vec!["Asphalt", "Bitumen"]);
    }

    #[test]
    fn test_env_invalid_values_keep_defaults() {
        let mut config = Config::default();
        config.apply_env(env(&[("EPD_MAX_RESULTS", "viele"), ("EPD_USE_BATCH_MODE", "vielleicht")]));
        assert_eq!(config.matching.max_results, 10);
        assert!(config.matching.batch_mode);
    }

    #[test]
    fn test_password_alias_and_trailing_slash() {
        let config = complete();
        assert_eq!(config.catalog.password.as_deref(), Some("pw"));
        assert_eq!(config.catalog.base_url.as_deref(), Some("https://epd.example.com"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_first_missing() {
        let mut config = complete();
        config.llm.api_key = None;
        match config.validate() {
            Err(MatcherError::MissingSetting(name)) => assert_eq!(name, "AZURE_OPENAI_API_KEY"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(config.validate_catalog().is_ok());
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let mut config = complete();
        config.matching.batch_size = 0;
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_validate_thresholds() {
        let mut config = complete();
        config.thresholds.layer_and_type_mismatch_cap = 90;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MatcherError::Common(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("secret-key"), "secr****");
        assert_eq!(mask("pw"), "****");
    }

    #[test]
    fn test_display_lines_hide_secrets() {
        let lines = complete().display_lines().join("\n");
        assert!(lines.contains("secr****"));
        assert!(!lines.contains("secret-key"));
    }
}
