//! EPDカタログ
//!
//! - auth: トークン取得とキャッシュ
//! - client: `/api/Datasets` のHTTPクライアント
//! - pool: 起動時に一度だけ読み込む候補プール

mod auth;
mod client;
mod pool;

pub use auth::{effective_ttl, extract_token, TokenManager};
pub use client::{count_from_value, entry_from_value, CatalogClient};
pub use pool::{CandidatePool, PoolSettings, PoolStats};

use crate::error::Result;
use epd_matcher_common::CatalogEntry;
use indicatif::ProgressBar;

/// カタログの取得元
///
/// 詳細取得は複数スレッドから呼ばれるので `Send + Sync` を要求する。
pub trait CatalogProvider: Send + Sync {
    /// 一覧（基本情報のみ）。`labels` が空でなければ名前で絞り込む
    fn list(&self, labels: &[String]) -> Result<Vec<CatalogEntry>>;

    /// 1件の詳細。存在しなければ `None`
    fn get_detail(&self, id: &str) -> Result<Option<CatalogEntry>>;

    /// 件数
    fn count(&self, labels: &[String]) -> Result<usize>;

    /// 複数件の詳細を `workers` 並列で取得（入力順を保つ）
    ///
    /// 1件終わるごとに `progress` を進める。表示不要なら `ProgressBar::hidden()`。
    fn get_details(
        &self,
        ids: &[String],
        workers: usize,
        progress: &ProgressBar,
    ) -> Vec<Result<Option<CatalogEntry>>> {
        use rayon::prelude::*;

        let fetch_one = |id: &String| {
            let result = self.get_detail(id);
            progress.inc(1);
            result
        };
        let fetch = || -> Vec<Result<Option<CatalogEntry>>> { ids.par_iter().map(fetch_one).collect() };
        match rayon::ThreadPoolBuilder::new().num_threads(workers.max(1)).build() {
            Ok(pool) => pool.install(fetch),
            Err(e) => {
                tracing::warn!(error = %e, "thread pool unavailable, fetching details sequentially");
                ids.iter().map(fetch_one).collect()
            }
        }
    }
}
