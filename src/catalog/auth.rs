//! カタログAPIのトークン管理
//!
//! `/api/Auth/getToken` で取得したトークンを有効期限の少し手前までキャッシュする。
//! 並列の詳細取得から共有されるため内部状態は Mutex で守る。

use crate::error::{MatcherError, Result};
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const TOKEN_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct TokenManager {
    http: reqwest::blocking::Client,
    base_url: String,
    username: String,
    password: String,
    cached: Mutex<Option<CachedToken>>,
}

/// 安全マージンを引いた有効秒数（最低1秒）
pub fn effective_ttl(ttl: u64) -> u64 {
    ttl.saturating_sub((ttl / 10).min(60)).max(1)
}

/// 認証レスポンスからトークンとTTLを取り出す
pub fn extract_token(body: &str) -> Option<(String, u64)> {
    let trimmed = body.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => {
            let token = ["token", "access_token", "jwt"]
                .iter()
                .filter_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .find(|t| !t.is_empty())?
                .to_string();
            let ttl = map
                .get("expires_in")
                .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
                .unwrap_or(DEFAULT_TTL_SECS);
            Some((token, ttl))
        }
        Ok(Value::String(token)) if !token.trim().is_empty() => {
            Some((token.trim().to_string(), DEFAULT_TTL_SECS))
        }
        Ok(_) => None,
        // JSONでなければ本文そのものがトークン
        Err(_) if !trimmed.is_empty() => Some((trimmed.to_string(), DEFAULT_TTL_SECS)),
        Err(_) => None,
    }
}

impl TokenManager {
    pub fn new(
        http: reqwest::blocking::Client,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            cached: Mutex::new(None),
        }
    }

    /// 有効なトークンを返す（期限切れなら再取得）
    pub fn token(&self) -> Result<String> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| MatcherError::Auth("トークンキャッシュのロックに失敗".into()))?;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch()?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    /// キャッシュを破棄して次回に再取得させる
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }

    fn fetch(&self) -> Result<CachedToken> {
        let url = format!("{}/api/Auth/getToken", self.base_url);
        tracing::debug!(url = %url, "requesting catalog token");

        let response = self
            .http
            .post(&url)
            .timeout(TOKEN_TIMEOUT)
            .json(&json!({
                "username": self.username,
                "passwort": self.password,
            }))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(MatcherError::Auth(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let (value, ttl) = extract_token(&body)
            .ok_or_else(|| MatcherError::Auth("認証レスポンスにトークンがありません".into()))?;

        Ok(CachedToken {
            value,
            expires_at: Instant::now() + Duration::from_secs(effective_ttl(ttl)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_ttl() {
        assert_eq!(effective_ttl(3600), 3540);
        assert_eq!(effective_ttl(300), 270);
        assert_eq!(effective_ttl(5), 5);
        assert_eq!(effective_ttl(0), 1);
    }

    #[test]
    fn test_extract_token_object() {
        let (token, ttl) = extract_token(r#"{"access_token": "abc", "expires_in": 120}"#).unwrap();
        assert_eq!(token, "abc");
        assert_eq!(ttl, 120);
    }

    #[test]
    fn test_extract_token_prefers_token_key() {
        let (token, ttl) = extract_token(r#"{"token": "t1", "jwt": "j1"}"#).unwrap();
        assert_eq!(token, "t1");
        assert_eq!(ttl, 3600);
    }

    #[test]
    fn test_extract_token_string_and_raw() {
        assert_eq!(extract_token(r#""quoted""#).unwrap().0, "quoted");
        assert_eq!(extract_token("eyJraw.token\n").unwrap().0, "eyJraw.token");
    }

    #[test]
    fn test_extract_token_missing() {
        assert!(extract_token(r#"{"message": "ok"}"#).is_none());
        assert!(extract_token("   ").is_none());
    }
}
