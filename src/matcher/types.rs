use crate::catalog::CandidatePool;
use crate::config::{Config, MatchingConfig};
use crate::gateway::ChatGateway;
use epd_matcher_common::{LayerMatchResult, PromptOptions};

use super::report::RunSummary;

/// 1回の実行で共有する状態（main で一度だけ作る）
pub struct Session {
    pub config: Config,
    pub pool: CandidatePool,
    pub gateway: Box<dyn ChatGateway>,
}

impl Session {
    pub fn new(config: Config, pool: CandidatePool, gateway: Box<dyn ChatGateway>) -> Self {
        Self {
            config,
            pool,
            gateway,
        }
    }
}

/// 有効にする処理段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSet {
    pub prefilter: bool,
    pub validation: bool,
    pub glossary: bool,
    pub detail_mode: bool,
    pub batch_mode: bool,
}

impl Default for StageSet {
    fn default() -> Self {
        Self {
            prefilter: true,
            validation: true,
            glossary: true,
            detail_mode: false,
            batch_mode: true,
        }
    }
}

impl StageSet {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            prefilter: config.use_prefilter,
            validation: config.use_validation,
            glossary: config.use_glossary,
            detail_mode: config.detail_matching,
            batch_mode: config.batch_mode,
        }
    }

    pub fn prompt_options(&self, max_results: usize) -> PromptOptions {
        PromptOptions {
            max_results,
            detail_mode: self.detail_mode,
            include_glossary: self.glossary,
        }
    }
}

/// 照合の結果（入力と同じ順）
#[derive(Debug, Clone)]
pub struct MatchRun {
    pub results: Vec<LayerMatchResult>,
    pub summary: RunSummary,
}
