//! 照合結果の集約
//!
//! 検証済み候補（信頼度降順）から、ID重複を除き件数を絞って最終結果を作る。

use crate::types::{LayerMatchResult, MatchCandidate, RawMatch};
use crate::validator::sort_by_confidence;
use std::collections::HashSet;

/// 重複除去（先勝ち）と件数制限
///
/// 入力は信頼度降順であること。先に現れた候補が最も信頼度の高いものになる。
pub fn finalize(candidates: Vec<MatchCandidate>, max_results: usize) -> LayerMatchResult {
    let mut seen = HashSet::new();
    let candidates = candidates
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .take(max_results)
        .collect();
    LayerMatchResult { candidates }
}

/// 検証を行わない場合の候補（生の信頼度で降順）
pub fn unvalidated(matches: Vec<RawMatch>) -> Vec<MatchCandidate> {
    let mut candidates: Vec<MatchCandidate> =
        matches.into_iter().map(MatchCandidate::unvalidated).collect();
    sort_by_confidence(&mut candidates);
    candidates
}
