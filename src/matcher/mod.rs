//! 照合パイプライン
//!
//! 材料をバッチに分け、バッチごとに
//! 解析 → プレフィルタ → プロンプト → LLM → 応答パース → 検証 → 集約
//! の順で処理する。LLM呼び出しは逐次で、失敗はそのバッチの空結果になる。

mod report;
mod types;

pub use report::{BatchReport, RunSummary};
pub use types::{MatchRun, Session, StageSet};

use epd_matcher_common::aggregate::{finalize, unvalidated};
use epd_matcher_common::{
    build_batch_prompt, build_single_prompt, filter_batch, parse_batch_response, parse_single_response,
    validate_batch, BatchRequest, CatalogEntry, LayerMatchResult, MatchCandidate, MaterialInput,
    ParsedResponse, RawMatch, SYSTEM_PROMPT,
};

pub struct MatchPipeline<'a> {
    session: &'a Session,
    stages: StageSet,
    verbose: bool,
}

impl<'a> MatchPipeline<'a> {
    pub fn new(session: &'a Session, stages: StageSet) -> Self {
        Self {
            session,
            stages,
            verbose: false,
        }
    }

    /// 設定どおりの処理段で作る
    pub fn from_session(session: &'a Session) -> Self {
        Self::new(session, StageSet::from_config(&session.config.matching))
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn stages(&self) -> StageSet {
        self.stages
    }

    /// 全材料を照合する（結果は入力と同じ順）
    pub fn match_batch(&self, materials: &[MaterialInput], max_results: usize) -> MatchRun {
        let chunk_size = if self.stages.batch_mode {
            self.session.config.matching.batch_size.max(1)
        } else {
            1
        };

        let mut summary = RunSummary::new(materials.len());
        let mut results = Vec::with_capacity(materials.len());

        for (i, chunk) in materials.chunks(chunk_size).enumerate() {
            if self.verbose {
                println!("  バッチ {}: {}件", i + 1, chunk.len());
            }
            let (chunk_results, report) = self.run_chunk(i + 1, chunk, max_results);
            results.extend(chunk_results);
            summary.reports.push(report);
        }

        MatchRun { results, summary }
    }

    fn candidates(&self, request: &BatchRequest) -> Vec<&'a CatalogEntry> {
        let pool = self.session.pool.entries();
        if !self.stages.prefilter {
            return pool.iter().collect();
        }

        let filtered = filter_batch(
            pool,
            &request.items,
            self.session.config.matching.filter_max_per_material,
        );
        if self.verbose {
            println!("{}", filtered.summary());
        }
        tracing::debug!(
            pool = filtered.pool_size,
            kept = filtered.combined.len(),
            "prefilter applied"
        );
        filtered.combined
    }

    /// 候補ID がプールに無いものを除く（検証を行わない場合）
    fn known_only(&self, matches: Vec<RawMatch>, report: &mut BatchReport) -> Vec<RawMatch> {
        let (known, unknown): (Vec<RawMatch>, Vec<RawMatch>) = matches
            .into_iter()
            .partition(|m| self.session.pool.get(&m.id).is_some());
        report.unknown_ids += unknown.len();
        known
    }

    fn run_chunk(
        &self,
        batch_no: usize,
        inputs: &[MaterialInput],
        max_results: usize,
    ) -> (Vec<LayerMatchResult>, BatchReport) {
        let request = BatchRequest::new(inputs);
        let mut report = BatchReport::new(batch_no, request.len());

        let candidates = self.candidates(&request);
        report.candidates_in_prompt = candidates.len();

        if candidates.is_empty() {
            tracing::info!(batch = batch_no, "no candidates after prefilter, skipping LLM call");
            report.skipped = true;
            report.no_match_groups = (1..=request.len()).collect();
            return (vec![LayerMatchResult::default(); request.len()], report);
        }

        let options = self.stages.prompt_options(max_results);
        let single = match (self.stages.batch_mode, request.items.as_slice()) {
            (false, [item]) => Some(item),
            _ => None,
        };
        let prompt = match single {
            Some(item) => build_single_prompt(item, &candidates, &options),
            None => build_batch_prompt(&request, &candidates, &options),
        };
        tracing::debug!(batch = batch_no, chars = prompt.chars().count(), "prompt built");

        let parsed = match self.session.gateway.complete(SYSTEM_PROMPT, &prompt) {
            Ok(text) if single.is_some() => parse_single_response(&text),
            Ok(text) => parse_batch_response(&text, request.len()),
            Err(e) => {
                tracing::warn!(batch = batch_no, error = %e, "LLM call failed, returning empty results");
                report.gateway_error = Some(e.kind);
                ParsedResponse {
                    groups: vec![Vec::new(); request.len()],
                    ..Default::default()
                }
            }
        };
        if parsed.is_malformed() {
            tracing::warn!(batch = batch_no, "LLM response not parseable, returning empty results");
        }
        let missing = parsed.missing_groups().to_vec();
        if !missing.is_empty() {
            tracing::warn!(batch = batch_no, missing = ?missing, "response is missing groups");
        }
        report.status = parsed.status;

        let groups: Vec<Vec<MatchCandidate>> = if self.stages.validation {
            validate_batch(
                parsed.groups,
                &request.items,
                &self.session.pool,
                &self.session.config.thresholds,
            )
            .into_iter()
            .map(|group| {
                report.unknown_ids += group.unknown_ids.len();
                report.dropped_below_min += group.dropped_below_min;
                group.candidates
            })
            .collect()
        } else {
            parsed
                .groups
                .into_iter()
                .map(|matches| unvalidated(self.known_only(matches, &mut report)))
                .collect()
        };

        let results: Vec<LayerMatchResult> = groups
            .into_iter()
            .map(|candidates| finalize(candidates, max_results))
            .collect();

        let failed = report.call_failed();
        for (i, result) in results.iter().enumerate() {
            let group = i + 1;
            if !result.is_empty() {
                continue;
            }
            if failed || missing.contains(&group) {
                report.failed_groups.push(group);
            } else {
                report.no_match_groups.push(group);
            }
        }

        (results, report)
    }
}
