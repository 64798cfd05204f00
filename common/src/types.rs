//! EPD照合の型定義
//!
//! CLIとライブラリで共有される型:
//! - CatalogEntry: カタログ（EPDデータベース）の1レコード
//! - MaterialInput / BatchRequest: 照合対象の材料とバッチ
//! - RawMatch: LLM応答から抽出した候補
//! - MatchCandidate / LayerMatchResult: 検証後の候補と最終結果

use crate::material::{parse_material, MaterialClassification};
use crate::validator::ValidationReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// カタログの1レコード（取得後は不変）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(alias = "klassifizierung")]
    pub classification: String,
    #[serde(alias = "referenzjahr", skip_serializing_if = "Option::is_none")]
    pub reference_year: Option<String>,
    #[serde(alias = "gueltigkeit", skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,

    // 詳細取得時のみ
    #[serde(alias = "technischeBeschreibung", skip_serializing_if = "Option::is_none")]
    pub technical_description: Option<String>,
    #[serde(alias = "anmerkungen", skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(alias = "anwendungsgebiet", skip_serializing_if = "Option::is_none")]
    pub application_area: Option<String>,
    #[serde(alias = "anwendungshinweis", skip_serializing_if = "Option::is_none")]
    pub application_notes: Option<String>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = classification.into();
        self
    }

    /// 照合用テキスト（名前 + 分類、小文字）
    pub fn match_text(&self) -> String {
        format!("{} {}", self.name, self.classification).to_lowercase()
    }

    /// 詳細フィールドを持つか
    pub fn has_details(&self) -> bool {
        self.technical_description.is_some()
            || self.remarks.is_some()
            || self.application_area.is_some()
            || self.application_notes.is_some()
    }

    /// 詳細レコードの内容で補完する（IDと既存の名前は保持）
    pub fn merge_details(&mut self, detail: CatalogEntry) {
        if self.name.is_empty() {
            self.name = detail.name;
        }
        if self.classification.is_empty() {
            self.classification = detail.classification;
        }
        self.technical_description = detail.technical_description.or(self.technical_description.take());
        self.remarks = detail.remarks.or(self.remarks.take());
        self.application_area = detail.application_area.or(self.application_area.take());
        self.application_notes = detail.application_notes.or(self.application_notes.take());
    }
}

/// 照合対象の材料（層レコード1件分）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaterialInput {
    /// 材料の自由記述（例: "AC 11 D S"）
    pub material: String,
    /// 層名（例: "Deckschicht"）
    pub layer_hint: String,
    /// 体積 [m³]
    pub volume: Option<f64>,
    /// IFC要素数
    pub guid_count: usize,
}

impl MaterialInput {
    pub fn new(material: impl Into<String>, layer_hint: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            layer_hint: layer_hint.into(),
            ..Default::default()
        }
    }
}

/// バッチ内の1材料（group は1始まりの対応付け番号）
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub group: usize,
    pub input: MaterialInput,
    pub classification: MaterialClassification,
}

/// 1回のLLM呼び出しで扱う材料の並び
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
}

impl BatchRequest {
    pub fn new(inputs: &[MaterialInput]) -> Self {
        let items = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| BatchItem {
                group: i + 1,
                input: input.clone(),
                classification: parse_material(&input.material, &input.layer_hint),
            })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// LLM応答から抽出した未検証の候補
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMatch {
    pub id: String,
    pub rationale: String,
    pub confidence: Option<u8>,
}

/// 検証済みの候補
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub id: String,
    pub rationale: String,
    pub raw_confidence: Option<u8>,
    /// 常に raw_confidence 以下
    pub validated_confidence: Option<u8>,
    pub validation_reason: ValidationReason,
}

impl MatchCandidate {
    /// 検証を行わない候補
    pub fn unvalidated(raw: RawMatch) -> Self {
        Self {
            id: raw.id,
            rationale: raw.rationale,
            raw_confidence: raw.confidence,
            validated_confidence: raw.confidence,
            validation_reason: ValidationReason::NotValidated,
        }
    }

    /// 並び替えキー（未設定は最後）
    pub fn sort_key(&self) -> i16 {
        self.validated_confidence.map_or(-1, i16::from)
    }
}

/// 1材料の最終結果（信頼度降順、ID重複なし）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMatchResult {
    pub candidates: Vec<MatchCandidate>,
}

impl LayerMatchResult {
    pub fn ids(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.id.clone()).collect()
    }

    /// ID → 検証後信頼度（未設定の候補は含めない）
    pub fn confidence_map(&self) -> BTreeMap<String, u8> {
        self.candidates
            .iter()
            .filter_map(|c| c.validated_confidence.map(|conf| (c.id.clone(), conf)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_deserialize_api_names() {
        let json = r#"{"id":"42","name":"Asphaltdeckschicht","klassifizierung":"Asphalt","technischeBeschreibung":"Walzasphalt"}"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.classification, "Asphalt");
        assert_eq!(entry.technical_description.as_deref(), Some("Walzasphalt"));
        assert!(entry.has_details());
    }

    #[test]
    fn test_match_text_lowercase() {
        let entry = CatalogEntry::new("1", "Asphaltbinder").with_classification("Bitumen");
        assert_eq!(entry.match_text(), "asphaltbinder bitumen");
    }

    #[test]
    fn test_merge_details_keeps_summary_name() {
        let mut entry = CatalogEntry::new("1", "Asphaltbinder");
        let mut detail = CatalogEntry::new("1", "Asphaltbinder AC 16 B S");
        detail.remarks = Some("PmB".into());
        entry.merge_details(detail);
        assert_eq!(entry.name, "Asphaltbinder");
        assert_eq!(entry.remarks.as_deref(), Some("PmB"));
    }

    #[test]
    fn test_batch_request_groups_are_one_based() {
        let batch = BatchRequest::new(&[
            MaterialInput::new("AC 11 D S", "Deckschicht"),
            MaterialInput::new("AC 16 B S", "Binderschicht"),
        ]);
        let groups: Vec<usize> = batch.items.iter().map(|i| i.group).collect();
        assert_eq!(groups, vec![1, 2]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_confidence_map_skips_unset() {
        let result = LayerMatchResult {
            candidates: vec![
                MatchCandidate::unvalidated(RawMatch { id: "1".into(), rationale: String::new(), confidence: Some(80) }),
                MatchCandidate::unvalidated(RawMatch { id: "2".into(), rationale: String::new(), confidence: None }),
            ],
        };
        assert_eq!(result.ids(), vec!["1", "2"]);
        let map = result.confidence_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("1"), Some(&80));
    }
}
