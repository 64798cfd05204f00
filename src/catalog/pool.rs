//! 候補プール
//!
//! 起動時に一度だけカタログを読み込み、以降は読み取り専用で共有する。
//! 詳細取得に失敗したエントリは基本情報のまま残す。

use super::CatalogProvider;
use crate::error::{MatcherError, Result};
use epd_matcher_common::{CatalogEntry, CatalogLookup};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};

/// プール準備の設定
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// 保持する最大件数（一覧の先頭から）
    pub max_entries: usize,
    /// 詳細フィールドを取得するか
    pub detail_enrichment: bool,
    /// 詳細取得の並列数
    pub workers: usize,
    /// 一覧の名前絞り込み
    pub labels: Vec<String>,
    /// 進捗バーを表示するか
    pub show_progress: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_entries: 200,
            detail_enrichment: false,
            workers: 10,
            labels: Vec::new(),
            show_progress: false,
        }
    }
}

/// 準備時の統計
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub listed: usize,
    pub duplicates_dropped: usize,
    pub truncated: usize,
    pub detail_failures: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    stats: PoolStats,
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("  [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message("EPD詳細");
    bar
}

impl CandidatePool {
    /// カタログから読み込む
    pub fn prime<P: CatalogProvider + ?Sized>(provider: &P, settings: &PoolSettings) -> Result<Self> {
        let listed = provider.list(&settings.labels)?;
        let mut stats = PoolStats {
            listed: listed.len(),
            ..Default::default()
        };

        let mut seen = HashSet::new();
        let mut entries: Vec<CatalogEntry> = listed
            .into_iter()
            .filter(|entry| !entry.id.is_empty() && seen.insert(entry.id.clone()))
            .collect();
        stats.duplicates_dropped = stats.listed - entries.len();

        if entries.len() > settings.max_entries {
            stats.truncated = entries.len() - settings.max_entries;
            entries.truncate(settings.max_entries);
        }

        if entries.is_empty() {
            return Err(MatcherError::EmptyCatalog);
        }

        if settings.detail_enrichment {
            let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
            let bar = progress_bar(ids.len(), settings.show_progress);
            let details = provider.get_details(&ids, settings.workers, &bar);
            bar.finish_and_clear();

            for (entry, detail) in entries.iter_mut().zip(details) {
                match detail {
                    Ok(Some(detail)) => entry.merge_details(detail),
                    Ok(None) => stats.detail_failures += 1,
                    Err(e) => {
                        stats.detail_failures += 1;
                        tracing::warn!(id = %entry.id, error = %e, "detail fetch failed, keeping list data");
                    }
                }
            }
        }

        tracing::info!(
            listed = stats.listed,
            kept = entries.len(),
            duplicates = stats.duplicates_dropped,
            truncated = stats.truncated,
            detail_failures = stats.detail_failures,
            "candidate pool primed"
        );

        let mut pool = Self::from_entries(entries);
        pool.stats = stats;
        Ok(pool)
    }

    /// 既存のエントリから作る（重複IDは先勝ち）
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            if index.contains_key(&entry.id) {
                continue;
            }
            index.insert(entry.id.clone(), kept.len());
            kept.push(entry);
        }
        let stats = PoolStats {
            listed: kept.len(),
            ..Default::default()
        };
        Self {
            entries: kept,
            index,
            stats,
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl CatalogLookup for CandidatePool {
    fn lookup(&self, id: &str) -> Option<&CatalogEntry> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeCatalog {
        entries: Vec<CatalogEntry>,
        detail_calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn new(entries: Vec<CatalogEntry>) -> Self {
            Self {
                entries,
                detail_calls: AtomicUsize::new(0),
            }
        }
    }

    impl CatalogProvider for FakeCatalog {
        fn list(&self, _labels: &[String]) -> Result<Vec<CatalogEntry>> {
            Ok(self.entries.clone())
        }

        fn get_detail(&self, id: &str) -> Result<Option<CatalogEntry>> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            match id {
                "broken" => Err(MatcherError::Http("timeout".into())),
                "gone" => Ok(None),
                _ => {
                    let mut detail = CatalogEntry::new(id, "");
                    detail.technical_description = Some(format!("Beschreibung {}", id));
                    Ok(Some(detail))
                }
            }
        }

        fn count(&self, _labels: &[String]) -> Result<usize> {
            Ok(self.entries.len())
        }
    }

    fn entries(ids: &[&str]) -> Vec<CatalogEntry> {
        ids.iter().map(|id| CatalogEntry::new(*id, format!("EPD {}", id))).collect()
    }

    #[test]
    fn test_prime_dedupes_and_truncates() {
        let catalog = FakeCatalog::new(entries(&["1", "2", "1", "3", "4"]));
        let settings = PoolSettings {
            max_entries: 3,
            ..Default::default()
        };
        let pool = CandidatePool::prime(&catalog, &settings).unwrap();

        let ids: Vec<&str> = pool.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(pool.stats().listed, 5);
        assert_eq!(pool.stats().duplicates_dropped, 1);
        assert_eq!(pool.stats().truncated, 1);
        assert_eq!(catalog.detail_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prime_enrichment_degrades_per_entry() {
        let catalog = FakeCatalog::new(entries(&["a", "broken", "gone", "b"]));
        let settings = PoolSettings {
            detail_enrichment: true,
            workers: 2,
            ..Default::default()
        };
        let pool = CandidatePool::prime(&catalog, &settings).unwrap();

        let ids: Vec<&str> = pool.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "broken", "gone", "b"]);
        assert!(pool.get("a").unwrap().has_details());
        assert!(!pool.get("broken").unwrap().has_details());
        assert_eq!(pool.get("broken").unwrap().name, "EPD broken");
        assert_eq!(pool.stats().detail_failures, 2);
    }

    #[test]
    fn test_prime_empty_catalog() {
        let catalog = FakeCatalog::new(Vec::new());
        let result = CandidatePool::prime(&catalog, &PoolSettings::default());
        assert!(matches!(result, Err(MatcherError::EmptyCatalog)));
    }

    #[test]
    fn test_lookup() {
        let pool = CandidatePool::from_entries(entries(&["x", "y", "x"]));
        assert_eq!(pool.len(), 2);
        assert!(pool.lookup("y").is_some());
        assert!(pool.lookup("z").is_none());
    }
}
