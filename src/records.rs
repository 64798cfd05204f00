//! 層レコードの入出力
//!
//! 入力: `{ID_FOLDER}/input/{file}` の `{"Gruppen": [...]}`
//! 出力: 各グループに `id`（順位付き）と `id_confidence` を追加して `{ID_FOLDER}/output/{file}` へ。
//! 未知のフィールドはそのまま書き戻す。

use crate::error::{MatcherError, Result};
use epd_matcher_common::{LayerMatchResult, MaterialInput};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// 入力ドキュメント
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerDocument {
    #[serde(rename = "Gruppen", default)]
    pub groups: Vec<LayerRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 1層（グループ）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerRecord {
    #[serde(rename = "NAME", default)]
    pub name: String,
    #[serde(rename = "MATERIAL", default)]
    pub material: String,
    #[serde(rename = "Volumen", default, deserialize_with = "lenient_number")]
    pub volume: Option<f64>,
    #[serde(rename = "GUID", default, deserialize_with = "one_or_many")]
    pub guid: Vec<String>,

    /// 照合結果（順位順）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_confidence: Option<BTreeMap<String, u8>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 数値または数値文字列（"12,5" も可）
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    })
}

/// 単一文字列またはリスト
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = |v: &Value| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(&other).into_iter().collect(),
    })
}

impl LayerRecord {
    pub fn to_input(&self) -> MaterialInput {
        MaterialInput {
            material: self.material.clone(),
            layer_hint: self.name.clone(),
            volume: self.volume,
            guid_count: self.guid.len(),
        }
    }

    pub fn apply(&mut self, result: &LayerMatchResult) {
        self.id = Some(result.ids());
        self.id_confidence = Some(result.confidence_map());
    }
}

impl LayerDocument {
    pub fn inputs(&self) -> Vec<MaterialInput> {
        self.groups.iter().map(LayerRecord::to_input).collect()
    }

    /// 結果を各グループへ書き込む（入力と同じ順）
    pub fn apply_results(&mut self, results: &[LayerMatchResult]) -> Result<()> {
        if results.len() != self.groups.len() {
            return Err(MatcherError::InvalidInput(format!(
                "結果数 {} がグループ数 {} と一致しません",
                results.len(),
                self.groups.len()
            )));
        }
        for (record, result) in self.groups.iter_mut().zip(results) {
            record.apply(result);
        }
        Ok(())
    }
}

/// ID フォルダ内の入出力パス
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPaths {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl RecordPaths {
    pub fn new(id_folder: &Path, input_file: &str, output_file: &str) -> Self {
        Self {
            input: id_folder.join("input").join(input_file),
            output: id_folder.join("output").join(output_file),
        }
    }
}

pub fn load_document(path: &Path) -> Result<LayerDocument> {
    if !path.exists() {
        return Err(MatcherError::FileNotFound(path.display().to_string()));
    }
    let reader = BufReader::new(File::open(path)?);
    let document: LayerDocument = serde_json::from_reader(reader)?;
    if document.groups.is_empty() {
        tracing::warn!(path = %path.display(), "input has no groups");
    }
    Ok(document)
}

/// 出力フォルダが無ければ作る
pub fn save_document(path: &Path, document: &LayerDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, document)?;
    Ok(())
}
