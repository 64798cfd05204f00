//! `/api/Datasets` クライアント（blocking reqwest）

use super::auth::TokenManager;
use super::CatalogProvider;
use crate::config::CatalogConfig;
use crate::error::{MatcherError, Result};
use epd_matcher_common::CatalogEntry;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

const LIST_TIMEOUT: Duration = Duration::from_secs(60);
const DETAIL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CatalogClient {
    http: reqwest::blocking::Client,
    base_url: String,
    group_value: Option<String>,
    tokens: TokenManager,
}

/// 文字列または数値を文字列として取り出す（空は None）
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// APIの1行を CatalogEntry に正規化（IDが無ければ None）
pub fn entry_from_value(row: &Value) -> Option<CatalogEntry> {
    let obj = row.as_object()?;
    let field = |key: &str| obj.get(key).and_then(value_text);

    Some(CatalogEntry {
        id: field("id")?,
        name: field("name").unwrap_or_default(),
        classification: field("klassifizierung").unwrap_or_default(),
        reference_year: field("referenzjahr"),
        valid_until: field("gueltigkeit"),
        technical_description: field("technischeBeschreibung"),
        remarks: field("anmerkungen"),
        application_area: field("anwendungsgebiet"),
        application_notes: field("anwendungshinweis"),
    })
}

/// 件数レスポンスの解釈（整数 / {count|total} / {items} / 配列）
pub fn count_from_value(value: &Value) -> usize {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0) as usize,
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Array(items) => items.len(),
        Value::Object(map) => ["count", "total"]
            .iter()
            .find_map(|key| map.get(*key))
            .map(count_from_value)
            .or_else(|| map.get("items").and_then(Value::as_array).map(Vec::len))
            .unwrap_or(0),
        _ => 0,
    }
}

fn list_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

impl CatalogClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        group_value: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("epd-matcher/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MatcherError::Http(format!("HTTPクライアントの作成に失敗: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let tokens = TokenManager::new(http.clone(), base_url.clone(), username, password);

        Ok(Self {
            http,
            base_url,
            group_value: group_value.filter(|g| !g.trim().is_empty()),
            tokens,
        })
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let required = |name: &'static str, value: &Option<String>| {
            value.clone().ok_or(MatcherError::MissingSetting(name))
        };
        Self::new(
            required("ONLINE_EPD_API_BASE_URL", &config.base_url)?,
            required("ONLINE_EPD_API_USERNAME", &config.username)?,
            required("ONLINE_EPD_API_PASSWORD", &config.password)?,
            config.group_value.clone(),
        )
    }

    /// 認証付きGET。401なら一度だけトークンを取り直す
    fn get_json(&self, url: &str, query: &[(&str, String)], timeout: Duration) -> Result<Option<Value>> {
        let mut retried = false;
        loop {
            let token = self.tokens.token()?;
            let response = self
                .http
                .get(url)
                .query(query)
                .bearer_auth(&token)
                .header(reqwest::header::ACCEPT, "application/json")
                .timeout(timeout)
                .send()?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !retried {
                tracing::debug!(url = %url, "token rejected, refreshing");
                self.tokens.invalidate();
                retried = true;
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            let body = response.text()?;
            if !status.is_success() {
                return Err(MatcherError::HttpStatus {
                    status: status.as_u16(),
                    body,
                });
            }

            let value = serde_json::from_str(&body)
                .map_err(|e| MatcherError::ApiParse(format!("{}: {}", url, e)))?;
            return Ok(Some(value));
        }
    }

    fn datasets(&self, mut query: Vec<(&str, String)>) -> Result<Value> {
        if let Some(group) = &self.group_value {
            query.push(("gruppe", group.clone()));
        }
        let url = format!("{}/api/Datasets", self.base_url);
        self.get_json(&url, &query, LIST_TIMEOUT)?
            .ok_or_else(|| MatcherError::ApiParse(format!("{}: 404", url)))
    }
}

impl CatalogProvider for CatalogClient {
    fn list(&self, labels: &[String]) -> Result<Vec<CatalogEntry>> {
        let mut seen = HashSet::new();
        let entries: Vec<CatalogEntry> = list_items(self.datasets(Vec::new())?)
            .iter()
            .filter_map(entry_from_value)
            .filter(|entry| seen.insert(entry.id.clone()))
            .collect();

        let labels: Vec<String> = labels
            .iter()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        if labels.is_empty() {
            return Ok(entries);
        }

        let total = entries.len();
        let filtered: Vec<CatalogEntry> = entries
            .into_iter()
            .filter(|entry| {
                let name = entry.name.to_lowercase();
                labels.iter().any(|label| name.contains(label.as_str()))
            })
            .collect();
        tracing::info!(total, kept = filtered.len(), labels = labels.len(), "catalog label filter applied");
        Ok(filtered)
    }

    fn get_detail(&self, id: &str) -> Result<Option<CatalogEntry>> {
        let url = format!("{}/api/Datasets/{}", self.base_url, id);
        let row = match self.get_json(&url, &[], DETAIL_TIMEOUT)? {
            Some(Value::Array(mut rows)) if !rows.is_empty() => rows.swap_remove(0),
            Some(row @ Value::Object(_)) => row,
            _ => return Ok(None),
        };
        Ok(entry_from_value(&row))
    }

    fn count(&self, labels: &[String]) -> Result<usize> {
        let labels: Vec<&str> = labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()).collect();
        if labels.is_empty() {
            let value = self.datasets(vec![("countOnly", "true".into())])?;
            return Ok(count_from_value(&value));
        }

        let mut total = 0;
        for label in labels {
            let value = self.datasets(vec![
                ("countOnly", "true".into()),
                ("search", "true".into()),
                ("name", label.to_string()),
            ])?;
            total += count_from_value(&value);
        }
        Ok(total)
    }
}
