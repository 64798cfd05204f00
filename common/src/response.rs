//! LLMレスポンスパーサー
//!
//! モデルの出力は壊れていたり一部が欠けていたりする前提で扱う。
//! 抽出手順:
//! 1. ```json ... ``` ブロックがあれば中身を取り出す
//! 2. そのままJSONとしてデコード
//! 3. 失敗したら期待するキーを含む最小のオブジェクトを切り出して再試行
//! 4. それでも失敗したら全グループ空（Malformed）
//!
//! バッチではグループ番号フィールドで入力と対応付け、配列の位置は使わない。

use crate::types::RawMatch;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

/// バッチ応答のトップレベルキー
pub const BATCH_KEY: &str = "results";
/// 単一材料応答のトップレベルキー
pub const SINGLE_KEY: &str = "matches";

/// 応答の状態
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseStatus {
    #[default]
    Ok,
    /// 一部グループが欠落（1始まりの番号）
    Partial { missing_groups: Vec<usize> },
    /// スキーマ通りに読めなかった
    Malformed,
}

/// パース結果（groups は常に期待グループ数と同じ長さ）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub groups: Vec<Vec<RawMatch>>,
    pub status: ResponseStatus,
}

impl ParsedResponse {
    fn malformed(expected: usize) -> Self {
        Self {
            groups: vec![Vec::new(); expected],
            status: ResponseStatus::Malformed,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.status == ResponseStatus::Malformed
    }

    pub fn missing_groups(&self) -> &[usize] {
        match &self.status {
            ResponseStatus::Partial { missing_groups } => missing_groups,
            _ => &[],
        }
    }
}

/// コードフェンスを外す（なければそのまま）
pub fn strip_code_fence(text: &str) -> &str {
    lazy_static! {
        static ref RE_FENCE: Regex = Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap();
    }

    RE_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or_else(|| text.trim())
}

/// `"key":` を直接持つ最小のオブジェクトを切り出す
///
/// 文字列リテラル内の括弧は無視する。
pub fn extract_object_with_key<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{}\"", key);
    let bytes = text.as_bytes();
    let mut stack: Vec<usize> = Vec::new();
    let mut target_depth: Option<usize> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => {
                if target_depth.is_none()
                    && !stack.is_empty()
                    && text[i..].starts_with(&needle)
                    && text[i + needle.len()..].trim_start().starts_with(':')
                {
                    target_depth = Some(stack.len());
                }
                in_string = true;
            }
            b'{' => stack.push(i),
            b'}' => {
                if let Some(start) = stack.pop() {
                    if target_depth == Some(stack.len() + 1) {
                        return Some(&text[start..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    None
}

/// 最初の `{` から最後の `}` まで（キーを含む場合のみ）
fn extract_greedy<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let slice = text.get(start..=end)?;
    slice.contains(&format!("\"{}\"", key)).then_some(slice)
}

/// 期待キーを持つJSONオブジェクトとしてデコード
fn decode(text: &str, key: &str) -> Option<Value> {
    let body = strip_code_fence(text);
    let has_key = |v: &Value| v.get(key).is_some();

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if has_key(&value) {
            return Some(value);
        }
    }

    [extract_object_with_key(body, key), extract_greedy(body, key)]
        .into_iter()
        .flatten()
        .filter_map(|slice| serde_json::from_str::<Value>(slice).ok())
        .find(has_key)
}

/// 信頼度を [0,100] に丸める（数値でなければ未設定）
pub fn normalize_confidence(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => {
            let f = n.as_f64()?;
            if !f.is_finite() {
                return None;
            }
            f.trunc() as i64
        }
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(n.clamp(0, 100) as u8)
}

/// IDを文字列化（"id" または "uuid"）
fn match_id(value: &Value) -> Option<String> {
    let raw = value.get("id").or_else(|| value.get("uuid"))?;
    let id = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn parse_match(value: &Value) -> Option<RawMatch> {
    let id = match_id(value)?;
    let rationale = ["begruendung", "reason", "rationale"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .trim()
        .to_string();
    let confidence = value.get("confidence").and_then(normalize_confidence);

    Some(RawMatch {
        id,
        rationale,
        confidence,
    })
}

fn parse_matches(value: Option<&Value>) -> Vec<RawMatch> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_match).collect())
        .unwrap_or_default()
}

/// グループ番号（"schicht" / "gruppe" / "group"、数値または数字文字列）
fn group_number(value: &Value) -> Option<usize> {
    let raw = ["schicht", "gruppe", "group"]
        .iter()
        .find_map(|k| value.get(*k))?;
    match raw {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// バッチ応答をパース
///
/// # Arguments
/// * `text` - モデルの出力
/// * `expected` - 入力した材料数（グループ番号は 1..=expected）
pub fn parse_batch_response(text: &str, expected: usize) -> ParsedResponse {
    let Some(root) = decode(text, BATCH_KEY) else {
        return ParsedResponse::malformed(expected);
    };
    let Some(results) = root.get(BATCH_KEY).and_then(Value::as_array) else {
        return ParsedResponse::malformed(expected);
    };

    let mut groups = vec![Vec::new(); expected];
    let mut seen = vec![false; expected];

    for result in results {
        let Some(n) = group_number(result) else {
            continue;
        };
        if n == 0 || n > expected || seen[n - 1] {
            continue;
        }
        seen[n - 1] = true;
        groups[n - 1] = parse_matches(result.get(SINGLE_KEY));
    }

    let missing_groups: Vec<usize> = seen
        .iter()
        .enumerate()
        .filter(|(_, s)| !**s)
        .map(|(i, _)| i + 1)
        .collect();
    let status = if missing_groups.is_empty() {
        ResponseStatus::Ok
    } else {
        ResponseStatus::Partial { missing_groups }
    };

    ParsedResponse { groups, status }
}

/// 単一材料の応答をパース（groups は長さ1）
pub fn parse_single_response(text: &str) -> ParsedResponse {
    match decode(text, SINGLE_KEY) {
        Some(root) if root.get(SINGLE_KEY).is_some_and(Value::is_array) => ParsedResponse {
            groups: vec![parse_matches(root.get(SINGLE_KEY))],
            status: ResponseStatus::Ok,
        },
        _ => ParsedResponse::malformed(1),
    }
}
