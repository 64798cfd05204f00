//! 候補プレフィルタ
//!
//! キャッシュ済みのカタログから、1材料に関係する候補を
//! 優先（primary）と補完（secondary）の2段に振り分ける。
//! どちらの段でもカタログ上の順序を保つ。

use crate::glossary::{AltCategory, EXCLUSION_TERMS, GENERIC_ASPHALT_TERMS};
use crate::material::MaterialClassification;
use crate::text::{contains_any, contains_term, significant_words};
use crate::types::{BatchItem, CatalogEntry, MaterialInput};
use std::collections::HashSet;

/// primary がこれ未満なら有意語による補完を行う（非舗装カテゴリ）
const SMALL_PRIMARY: usize = 10;

/// 1材料のフィルタ統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub pool_size: usize,
    pub primary: usize,
    pub secondary: usize,
    pub excluded: usize,
}

/// 1材料のフィルタ結果
#[derive(Debug, Clone, Default)]
pub struct FilterResult<'a> {
    pub primary: Vec<&'a CatalogEntry>,
    pub secondary: Vec<&'a CatalogEntry>,
    pub stats: FilterStats,
}

impl<'a> FilterResult<'a> {
    /// primary → secondary の順に連結
    pub fn candidates(&self) -> Vec<&'a CatalogEntry> {
        self.primary.iter().chain(self.secondary.iter()).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.primary.len() + self.secondary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 舗装材の種別キーワード（種別の検索語 + ビチューメン系の汎用語）
fn paving_type_terms(c: &MaterialClassification) -> Vec<&'static str> {
    let mut terms: Vec<&'static str> = c
        .asphalt_type
        .map(|t| t.search_terms().to_vec())
        .unwrap_or_default();
    terms.extend_from_slice(GENERIC_ASPHALT_TERMS);
    terms
}

/// 上限に合わせて2段を切り詰める
fn cap_tiers(result: &mut FilterResult<'_>, max: usize) {
    if result.primary.len() >= max {
        result.primary.truncate(max);
        result.secondary.clear();
    } else {
        result.secondary.truncate(max - result.primary.len());
    }
    result.stats.primary = result.primary.len();
    result.stats.secondary = result.secondary.len();
}

fn filter_paving<'a>(
    pool: &'a [CatalogEntry],
    c: &MaterialClassification,
    result: &mut FilterResult<'a>,
) {
    let type_terms = paving_type_terms(c);

    for entry in pool {
        let text = entry.match_text();
        if contains_any(&text, EXCLUSION_TERMS) {
            result.stats.excluded += 1;
            continue;
        }
        if !contains_any(&text, &type_terms) {
            continue;
        }
        match c.required_keyword {
            Some(keyword) if !contains_term(&text, keyword) => result.secondary.push(entry),
            _ => result.primary.push(entry),
        }
    }
}

fn filter_category<'a>(
    pool: &'a [CatalogEntry],
    category: AltCategory,
    words: &[String],
    result: &mut FilterResult<'a>,
) {
    let mut rest = Vec::new();

    for entry in pool {
        let text = entry.match_text();
        if contains_any(&text, category.exclusions()) {
            result.stats.excluded += 1;
            continue;
        }
        if contains_any(&text, category.whitelist()) {
            result.primary.push(entry);
        } else {
            rest.push(entry);
        }
    }

    if result.primary.len() < SMALL_PRIMARY && !words.is_empty() {
        result.secondary = rest
            .into_iter()
            .filter(|entry| {
                let name = entry.name.to_lowercase();
                words.iter().any(|w| name.contains(w.as_str()))
            })
            .collect();
    }
}

fn filter_unknown<'a>(
    pool: &'a [CatalogEntry],
    words: &[String],
    max: usize,
    result: &mut FilterResult<'a>,
) {
    if words.is_empty() {
        result.primary = pool.iter().take(max).collect();
        return;
    }

    for entry in pool {
        let text = entry.match_text();
        if contains_any(&text, EXCLUSION_TERMS) {
            result.stats.excluded += 1;
            continue;
        }
        if words.iter().any(|w| text.contains(w.as_str())) {
            result.primary.push(entry);
        }
    }
}

/// 1材料の候補を絞り込む
///
/// # Arguments
/// * `pool` - キャッシュ済みカタログ
/// * `input` - 材料（有意語の抽出に使う）
/// * `c` - `input` の分類結果
/// * `max_per_material` - primary + secondary の上限
pub fn filter_candidates<'a>(
    pool: &'a [CatalogEntry],
    input: &MaterialInput,
    c: &MaterialClassification,
    max_per_material: usize,
) -> FilterResult<'a> {
    let mut result = FilterResult {
        stats: FilterStats {
            pool_size: pool.len(),
            ..Default::default()
        },
        ..Default::default()
    };
    let words = || significant_words(&format!("{} {}", input.material, input.layer_hint));

    if c.is_paving {
        filter_paving(pool, c, &mut result);
    } else if let Some(category) = c.known_category() {
        filter_category(pool, category, &words(), &mut result);
    } else {
        filter_unknown(pool, &words(), max_per_material, &mut result);
    }

    cap_tiers(&mut result, max_per_material);
    result
}

/// バッチ全体のフィルタ結果
#[derive(Debug, Clone, Default)]
pub struct BatchFilter<'a> {
    pub per_material: Vec<FilterResult<'a>>,
    /// 全材料の候補の和集合（カタログ順）
    pub combined: Vec<&'a CatalogEntry>,
    pub pool_size: usize,
}

impl BatchFilter<'_> {
    /// 削減率 [%]
    pub fn reduction_percent(&self) -> f64 {
        if self.pool_size == 0 {
            return 0.0;
        }
        (1.0 - self.combined.len() as f64 / self.pool_size as f64) * 100.0
    }

    /// 統計の表示用文字列
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "プレフィルタ: {}件 → {}件 ({:.1}%削減)",
            self.pool_size,
            self.combined.len(),
            self.reduction_percent()
        )];
        for (i, r) in self.per_material.iter().enumerate() {
            lines.push(format!(
                "  {}. 優先 {} / 補完 {} / 除外 {}",
                i + 1,
                r.stats.primary,
                r.stats.secondary,
                r.stats.excluded
            ));
        }
        lines.join("\n")
    }
}

/// バッチ内の全材料をフィルタし、プロンプト用の候補和集合を作る
pub fn filter_batch<'a>(
    pool: &'a [CatalogEntry],
    items: &[BatchItem],
    max_per_material: usize,
) -> BatchFilter<'a> {
    let per_material: Vec<FilterResult<'a>> = items
        .iter()
        .map(|item| filter_candidates(pool, &item.input, &item.classification, max_per_material))
        .collect();

    let selected: HashSet<&str> = per_material
        .iter()
        .flat_map(|r| r.candidates())
        .map(|e| e.id.as_str())
        .collect();
    let combined = pool.iter().filter(|e| selected.contains(e.id.as_str())).collect();

    BatchFilter {
        per_material,
        combined,
        pool_size: pool.len(),
    }
}
