//! 信頼度の検証・補正
//!
//! LLMが返した信頼度を規則で補正する。規則は上から順に評価し、
//! 最初に該当した規則で上限をかける（信頼度は下がることはあっても上がらない）。
//!
//! 1. 除外語を含む → excluded_cap
//! 2. 他カテゴリのシグナル語を含む → excluded_cap
//! 3. 必須の層キーワードがない → 種別が合えば layer_mismatch_cap、合わなければ layer_and_type_mismatch_cap
//! 4. 舗装材なのに種別・ビチューメン系の語がない → no_paving_keyword_cap
//! 5. 該当なし → そのまま

use crate::error::Error;
use crate::glossary::{AltCategory, EXCLUSION_TERMS, GENERIC_ASPHALT_TERMS, PAVING_SIGNAL_TERMS};
use crate::material::MaterialClassification;
use crate::text::{contains_any, contains_term};
use crate::types::{BatchItem, CatalogEntry, MatchCandidate, RawMatch};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 補正の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    Excluded,
    CategoryMismatch,
    LayerMissing,
    LayerAndTypeMissing,
    NoPavingReference,
    Validated,
    NotValidated,
}

impl ValidationReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Excluded => "Ausschlussbegriff",
            Self::CategoryMismatch => "Kategorie-Konflikt",
            Self::LayerMissing => "Schicht fehlt",
            Self::LayerAndTypeMissing => "Schicht und Typ fehlen",
            Self::NoPavingReference => "Kein Asphalt-Bezug",
            Self::Validated => "Validiert",
            Self::NotValidated => "Nicht validiert",
        }
    }

    /// 規則が発火したか
    pub fn is_downgrade(&self) -> bool {
        !matches!(self, Self::Validated | Self::NotValidated)
    }
}

/// 検証の閾値
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationThresholds {
    /// これ未満の候補は捨てる
    pub min_confidence: u8,
    pub excluded_cap: u8,
    pub layer_mismatch_cap: u8,
    pub layer_and_type_mismatch_cap: u8,
    pub no_paving_keyword_cap: u8,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_confidence: 25,
            excluded_cap: 20,
            layer_mismatch_cap: 45,
            layer_and_type_mismatch_cap: 30,
            no_paving_keyword_cap: 35,
        }
    }
}

impl ValidationThresholds {
    /// 値の整合性（0〜100、層+種別の上限は層のみの上限以下）
    pub fn check(&self) -> crate::Result<()> {
        let values = [
            ("minConfidence", self.min_confidence),
            ("excludedCap", self.excluded_cap),
            ("layerMismatchCap", self.layer_mismatch_cap),
            ("layerAndTypeMismatchCap", self.layer_and_type_mismatch_cap),
            ("noPavingKeywordCap", self.no_paving_keyword_cap),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| *v > 100) {
            return Err(Error::Config(format!("{} = {} は 0〜100 の範囲外です", name, value)));
        }
        if self.layer_and_type_mismatch_cap > self.layer_mismatch_cap {
            return Err(Error::Config(format!(
                "layerAndTypeMismatchCap ({}) は layerMismatchCap ({}) 以下にしてください",
                self.layer_and_type_mismatch_cap, self.layer_mismatch_cap
            )));
        }
        Ok(())
    }
}

/// IDからカタログレコードを引く
pub trait CatalogLookup {
    fn lookup(&self, id: &str) -> Option<&CatalogEntry>;
}

impl CatalogLookup for [CatalogEntry] {
    fn lookup(&self, id: &str) -> Option<&CatalogEntry> {
        self.iter().find(|e| e.id == id)
    }
}

impl CatalogLookup for HashMap<String, CatalogEntry> {
    fn lookup(&self, id: &str) -> Option<&CatalogEntry> {
        self.get(id)
    }
}

/// 分類に対して有効な除外語
fn exclusions_for(c: &MaterialClassification) -> &'static [&'static str] {
    match c.known_category() {
        Some(category) => category.exclusions(),
        None => EXCLUSION_TERMS,
    }
}

/// 自カテゴリ以外のシグナル語を含むか
fn has_foreign_signal(text: &str, c: &MaterialClassification) -> bool {
    let own = if c.is_paving {
        None
    } else {
        match c.known_category() {
            Some(category) => Some(category),
            // 所属が決まらなければ食い違いも判定できない
            None => return false,
        }
    };

    if own.is_some() && contains_any(text, PAVING_SIGNAL_TERMS) {
        return true;
    }
    AltCategory::CLASSIFIABLE
        .into_iter()
        .filter(|category| Some(*category) != own)
        .any(|category| contains_any(text, category.signal_terms()))
}

/// 種別キーワード（種別の検索語 + 汎用語）を含むか
fn has_type_keyword(text: &str, c: &MaterialClassification) -> bool {
    let type_terms = c.asphalt_type.map(|t| t.search_terms()).unwrap_or_default();
    contains_any(text, type_terms) || contains_any(text, GENERIC_ASPHALT_TERMS)
}

/// 1候補の信頼度を補正
///
/// 戻り値の信頼度は常に `raw` 以下。`raw` が未設定なら未設定のまま。
pub fn validate(
    entry: &CatalogEntry,
    c: &MaterialClassification,
    raw: Option<u8>,
    thresholds: &ValidationThresholds,
) -> (Option<u8>, ValidationReason) {
    let text = entry.match_text();
    let cap = |limit: u8| raw.map(|r| r.min(limit));

    if contains_any(&text, exclusions_for(c)) {
        return (cap(thresholds.excluded_cap), ValidationReason::Excluded);
    }

    if has_foreign_signal(&text, c) {
        return (cap(thresholds.excluded_cap), ValidationReason::CategoryMismatch);
    }

    if let Some(keyword) = c.required_keyword {
        if !contains_term(&text, keyword) {
            return if c.is_paving && has_type_keyword(&text, c) {
                (cap(thresholds.layer_mismatch_cap), ValidationReason::LayerMissing)
            } else {
                (cap(thresholds.layer_and_type_mismatch_cap), ValidationReason::LayerAndTypeMissing)
            };
        }
    }

    if c.is_paving && !has_type_keyword(&text, c) {
        return (cap(thresholds.no_paving_keyword_cap), ValidationReason::NoPavingReference);
    }

    (raw.map(|r| r.min(100)), ValidationReason::Validated)
}

/// 1グループの検証結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedGroup {
    /// 検証後信頼度の降順
    pub candidates: Vec<MatchCandidate>,
    /// 最低信頼度未満で捨てた数
    pub dropped_below_min: usize,
    /// カタログに存在しないID
    pub unknown_ids: Vec<String>,
}

/// 1候補を検証して MatchCandidate を作る
pub fn validate_match(
    raw: RawMatch,
    entry: &CatalogEntry,
    c: &MaterialClassification,
    thresholds: &ValidationThresholds,
) -> MatchCandidate {
    let (validated, reason) = validate(entry, c, raw.confidence, thresholds);

    let mut rationale = raw.rationale;
    if validated != raw.confidence {
        rationale = format!("{} [Korrigiert: {}]", rationale, reason.label());
    }

    MatchCandidate {
        id: raw.id,
        rationale,
        raw_confidence: raw.confidence,
        validated_confidence: validated,
        validation_reason: reason,
    }
}

/// 検証後の候補を残すか
fn keep(candidate: &MatchCandidate, min_confidence: u8) -> bool {
    match candidate.validated_confidence {
        Some(conf) => conf >= min_confidence,
        None => !candidate.validation_reason.is_downgrade(),
    }
}

/// 信頼度の降順に並べ替え（安定ソート、未設定は最後）
pub fn sort_by_confidence(candidates: &mut [MatchCandidate]) {
    candidates.sort_by_key(|c| std::cmp::Reverse(c.sort_key()));
}

/// バッチの全グループを検証
///
/// # Arguments
/// * `groups` - グループ番号順の候補（`items` と同じ長さ）
/// * `items` - バッチ内の材料
/// * `pool` - 候補IDの参照先
pub fn validate_batch<L: CatalogLookup + ?Sized>(
    groups: Vec<Vec<RawMatch>>,
    items: &[BatchItem],
    pool: &L,
    thresholds: &ValidationThresholds,
) -> Vec<ValidatedGroup> {
    groups
        .into_iter()
        .zip(items)
        .map(|(matches, item)| {
            let mut group = ValidatedGroup::default();

            for raw in matches {
                let Some(entry) = pool.lookup(&raw.id) else {
                    group.unknown_ids.push(raw.id);
                    continue;
                };
                let candidate = validate_match(raw, entry, &item.classification, thresholds);
                if keep(&candidate, thresholds.min_confidence) {
                    group.candidates.push(candidate);
                } else {
                    group.dropped_below_min += 1;
                }
            }

            sort_by_confidence(&mut group.candidates);
            group
        })
        .collect()
}
