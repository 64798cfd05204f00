//! 実行レポート
//!
//! LLM呼び出しごとの結果を記録し、「該当なし」と「サービス失敗」を区別して集計する。

use crate::gateway::GatewayErrorKind;
use chrono::{DateTime, Local};
use epd_matcher_common::ResponseStatus;

/// LLM呼び出し1回分の記録
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// 1始まり
    pub batch: usize,
    pub groups: usize,
    pub candidates_in_prompt: usize,
    /// 候補が無くLLMを呼ばなかった
    pub skipped: bool,
    pub gateway_error: Option<GatewayErrorKind>,
    pub status: ResponseStatus,
    /// 失敗・欠落で空になったグループ（1始まり）
    pub failed_groups: Vec<usize>,
    /// 正常応答で候補が残らなかったグループ
    pub no_match_groups: Vec<usize>,
    pub unknown_ids: usize,
    pub dropped_below_min: usize,
}

impl BatchReport {
    pub fn new(batch: usize, groups: usize) -> Self {
        Self {
            batch,
            groups,
            ..Default::default()
        }
    }

    /// 呼び出し全体が失敗したか
    pub fn call_failed(&self) -> bool {
        self.gateway_error.is_some() || self.status == ResponseStatus::Malformed
    }

    /// 状態の短い表示
    pub fn outcome(&self) -> String {
        if self.skipped {
            return "候補なし（未送信）".into();
        }
        if let Some(kind) = self.gateway_error {
            return format!("失敗: {}", kind);
        }
        match &self.status {
            ResponseStatus::Ok => "OK".into(),
            ResponseStatus::Partial { missing_groups } => format!("一部欠落 {:?}", missing_groups),
            ResponseStatus::Malformed => "応答不正".into(),
        }
    }
}

/// 実行全体の集計
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub materials: usize,
    pub reports: Vec<BatchReport>,
}

impl RunSummary {
    pub fn new(materials: usize) -> Self {
        Self {
            started_at: Local::now(),
            materials,
            reports: Vec::new(),
        }
    }

    pub fn llm_calls(&self) -> usize {
        self.reports.iter().filter(|r| !r.skipped).count()
    }

    pub fn failed_calls(&self) -> usize {
        self.reports.iter().filter(|r| r.call_failed()).count()
    }

    /// サービス側の失敗で空になった材料数
    pub fn failed_materials(&self) -> usize {
        self.reports.iter().map(|r| r.failed_groups.len()).sum()
    }

    /// 正常に処理されたが該当が無かった材料数
    pub fn no_match_materials(&self) -> usize {
        self.reports.iter().map(|r| r.no_match_groups.len()).sum()
    }

    pub fn unknown_ids(&self) -> usize {
        self.reports.iter().map(|r| r.unknown_ids).sum()
    }

    pub fn dropped_below_min(&self) -> usize {
        self.reports.iter().map(|r| r.dropped_below_min).sum()
    }

    /// 表形式の文字列
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("実行サマリー ({})", self.started_at.format("%Y-%m-%d %H:%M:%S")),
            format!(
                "  {:>5} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | 状態",
                "バッチ", "材料", "候補", "該当無", "失敗", "不明ID"
            ),
        ];
        for r in &self.reports {
            lines.push(format!(
                "  {:>5} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {}",
                r.batch,
                r.groups,
                r.candidates_in_prompt,
                r.no_match_groups.len(),
                r.failed_groups.len(),
                r.unknown_ids,
                r.outcome()
            ));
        }
        lines.push(format!(
            "  材料 {}件 / LLM呼び出し {}回（失敗 {}回）",
            self.materials,
            self.llm_calls(),
            self.failed_calls()
        ));
        lines.push(format!(
            "  該当なし {}件 / サービス失敗 {}件 / 不明ID {}件 / 最低信頼度未満 {}件",
            self.no_match_materials(),
            self.failed_materials(),
            self.unknown_ids(),
            self.dropped_below_min()
        ));
        lines.join("\n")
    }
}
