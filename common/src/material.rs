//! 材料コードパーサー
//!
//! 自由記述の材料名（+ 層名ヒント）を構造化された分類に変換する。
//! 判定は以下の順で行い、先に成功したものを採用する:
//! 1. 厳密な文法 `TYPE GRAIN [LAYER] [LOAD]`（例: "AC 11 D S"）
//! 2. 種別キーワードのあいまい検索（誤記を含む）
//! 3. 層が未確定なら層名ヒントから推定
//! 4. PmB（ポリマー改質）判定は上記と独立に実施
//! 5. 舗装材でなければ骨材・断熱材・防水材のカテゴリ判定

use crate::glossary::{find_grade, AltCategory, AsphaltType, LayerCode, LoadClass, PMB_KEYWORDS};
use crate::text::{contains_any, normalize};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// 分類の根拠
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// 文法に完全一致
    ExactCode,
    /// キーワードのあいまい一致
    FuzzyText,
    /// 層名ヒントのみ
    HintFallback,
    #[default]
    None,
}

impl ClassificationSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExactCode => "bezeichnung",
            Self::FuzzyText => "fuzzy",
            Self::HintFallback => "schichtname",
            Self::None => "unbekannt",
        }
    }
}

/// 材料の分類結果（入力テキストのみから決まる）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialClassification {
    pub asphalt_type: Option<AsphaltType>,
    pub type_name: Option<&'static str>,
    pub layer: Option<LayerCode>,
    pub layer_name: Option<&'static str>,
    /// EPD名が含むべき語（層から決まる）
    pub required_keyword: Option<&'static str>,
    pub grain_mm: Option<u32>,
    pub load: Option<LoadClass>,
    pub is_pmb: bool,
    pub is_paving: bool,
    pub source: ClassificationSource,
    /// 舗装材以外のカテゴリ（舗装材の場合は None）
    pub alt_category: Option<AltCategory>,
}

impl MaterialClassification {
    fn set_type(&mut self, asphalt_type: AsphaltType) {
        self.asphalt_type = Some(asphalt_type);
        self.type_name = Some(asphalt_type.display_name());
        self.is_paving = true;
    }

    fn set_layer(&mut self, layer: LayerCode) {
        self.layer = Some(layer);
        self.layer_name = Some(layer.display_name());
        self.required_keyword = Some(layer.required_keyword());
    }

    /// 種別もカテゴリも不明
    pub fn is_unknown(&self) -> bool {
        !self.is_paving && matches!(self.alt_category, None | Some(AltCategory::Unknown))
    }

    /// 既知の非舗装カテゴリ
    pub fn known_category(&self) -> Option<AltCategory> {
        match self.alt_category {
            Some(AltCategory::Unknown) | None => None,
            other => other,
        }
    }

    /// プロンプト用の1行コンテキスト
    ///
    /// 例: `AC=Asphaltbeton, D=Asphaltdeckschicht, EPD muss 'Deck' enthalten, S=besondere Beanspruchung`
    pub fn context_line(&self, material: &str) -> String {
        let mut parts = Vec::new();

        if let Some(t) = self.asphalt_type {
            let mut part = format!("{}={}", t.code(), t.display_name());
            if self.source == ClassificationSource::FuzzyText {
                part.push_str(" (angenommen)");
            }
            parts.push(part);
        } else if let Some(category) = self.known_category() {
            parts.push(format!("Kategorie: {}", category.display_name()));
        }

        if let Some(layer) = self.layer {
            parts.push(format!("{}={}", layer.code(), layer.display_name()));
            parts.push(format!("EPD muss '{}' enthalten", layer.required_keyword()));
        }
        if let Some(load) = self.load {
            parts.push(format!("{}={}", load.code(), load.display_name()));
        }
        if self.is_pmb {
            parts.push("PmB vorhanden".to_string());
        }
        if let Some(grade) = find_grade(material).filter(|_| self.source == ClassificationSource::ExactCode) {
            parts.push(format!(
                "Bindemittel {}, min. {:.1} M.-%",
                grade.binders.join("/"),
                grade.min_binder_content
            ));
        }

        if parts.is_empty() {
            format!("Unbekannte Bezeichnung: {}", material.trim())
        } else {
            parts.join(", ")
        }
    }
}

/// 文法一致の結果
struct CodeMatch {
    asphalt_type: AsphaltType,
    grain_mm: Option<u32>,
    layer: Option<LayerCode>,
    load: Option<LoadClass>,
}

/// `TYPE GRAIN [LAYER] [LOAD]` を解析（入力は大文字・空白正規化済み）
fn parse_code(upper: &str) -> Option<CodeMatch> {
    lazy_static! {
        static ref RE_CODE: Regex =
            Regex::new(r"^(AC|SMA|MA|PA)\s*(\d+)\s*(TD|T|B|D)?\s*([SNL])?").unwrap();
    }

    let caps = RE_CODE.captures(upper)?;
    let asphalt_type = AsphaltType::from_code(caps.get(1)?.as_str())?;
    Some(CodeMatch {
        asphalt_type,
        grain_mm: caps.get(2).and_then(|m| m.as_str().parse().ok()),
        layer: caps.get(3).and_then(|m| LayerCode::from_code(m.as_str())),
        load: caps.get(4).and_then(|m| LoadClass::from_code(m.as_str())),
    })
}

/// キーワードから種別を推定（小文字テキスト）
fn fuzzy_type(lower: &str) -> Option<AsphaltType> {
    AsphaltType::FUZZY_ORDER
        .into_iter()
        .find(|t| contains_any(lower, t.fuzzy_terms()))
}

/// 層名ヒントから層を推定
pub fn layer_from_hint(hint: &str) -> Option<LayerCode> {
    let hint = hint.to_lowercase();
    if hint.trim().is_empty() {
        return None;
    }
    LayerCode::HINT_ORDER
        .into_iter()
        .find(|layer| layer.name_variants().iter().any(|v| hint.contains(v)))
}

/// PmB判定
pub fn detect_pmb(text: &str) -> bool {
    let upper = text.to_uppercase();
    PMB_KEYWORDS.iter().any(|kw| upper.contains(kw))
}

/// 非舗装カテゴリを判定
fn detect_category(lower: &str) -> AltCategory {
    AltCategory::CLASSIFIABLE
        .into_iter()
        .find(|c| contains_any(lower, c.detection_terms()))
        .unwrap_or(AltCategory::Unknown)
}

/// 材料テキストを分類
///
/// # Arguments
/// * `material` - 材料の自由記述（例: "AC 11 D S", "Asphalt"）
/// * `layer_hint` - 層名（例: "Deckschicht"）。空でもよい
///
/// # Examples
/// ```
/// use epd_matcher_common::parse_material;
/// use epd_matcher_common::glossary::LayerCode;
///
/// let c = parse_material("AC 11 D S", "");
/// assert_eq!(c.layer, Some(LayerCode::Surface));
/// assert_eq!(c.required_keyword, Some("Deck"));
/// ```
pub fn parse_material(material: &str, layer_hint: &str) -> MaterialClassification {
    let lower = normalize(material);
    if lower.is_empty() {
        return MaterialClassification::default();
    }
    let upper = lower.to_uppercase();
    let mut c = MaterialClassification::default();

    if let Some(code) = parse_code(&upper) {
        c.set_type(code.asphalt_type);
        c.grain_mm = code.grain_mm;
        c.load = code.load;
        if let Some(layer) = code.layer.or(code.asphalt_type.default_layer()) {
            c.set_layer(layer);
        }
        c.source = ClassificationSource::ExactCode;
    } else if let Some(asphalt_type) = fuzzy_type(&lower) {
        c.set_type(asphalt_type);
        c.source = ClassificationSource::FuzzyText;
    }

    if c.layer.is_none() {
        if let Some(layer) = layer_from_hint(layer_hint) {
            c.set_layer(layer);
            if c.source == ClassificationSource::None {
                c.source = ClassificationSource::HintFallback;
            }
        } else if let Some(layer) = c.asphalt_type.and_then(|t| t.default_layer()) {
            c.set_layer(layer);
        }
    }

    c.is_pmb = detect_pmb(&upper);

    if c.asphalt_type.is_none() {
        let combined = format!("{} {}", lower, normalize(layer_hint));
        c.alt_category = Some(detect_category(&combined));
    }

    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ========================================
    // 文法一致
    // ========================================

    #[test]
    fn test_parse_full_code() {
        let c = parse_material("AC 11 D S", "");
        assert_eq!(c.asphalt_type, Some(AsphaltType::Ac));
        assert_eq!(c.type_name, Some("Asphaltbeton"));
        assert_eq!(c.grain_mm, Some(11));
        assert_eq!(c.layer, Some(LayerCode::Surface));
        assert_eq!(c.required_keyword, Some("Deck"));
        assert_eq!(c.load, Some(LoadClass::Heavy));
        assert_eq!(c.source, ClassificationSource::ExactCode);
        assert!(c.is_paving);
        assert!(c.alt_category.is_none());
    }

    #[test]
    fn test_parse_tragdeck_code() {
        let c = parse_material("AC 16 TD", "");
        assert_eq!(c.layer, Some(LayerCode::BaseSurface));
        assert_eq!(c.required_keyword, Some("Tragdeck"));
        assert_eq!(c.load, None);
    }

    #[test]
    fn test_parse_compact_code() {
        let c = parse_material("ac16bs", "");
        assert_eq!(c.grain_mm, Some(16));
        assert_eq!(c.layer, Some(LayerCode::Binder));
        assert_eq!(c.load, Some(LoadClass::Heavy));
    }

    #[test]
    fn test_parse_partial_code_keeps_nulls() {
        let c = parse_material("AC 22", "");
        assert_eq!(c.asphalt_type, Some(AsphaltType::Ac));
        assert_eq!(c.grain_mm, Some(22));
        assert_eq!(c.layer, None);
        assert_eq!(c.required_keyword, None);
        assert_eq!(c.load, None);
    }

    #[test]
    fn test_parse_partial_code_uses_hint_for_layer() {
        let c = parse_material("AC 22", "Tragschicht");
        assert_eq!(c.layer, Some(LayerCode::Base));
        assert_eq!(c.source, ClassificationSource::ExactCode);
    }

    #[test]
    fn test_sma_defaults_to_surface() {
        let c = parse_material("SMA 8 N", "");
        assert_eq!(c.asphalt_type, Some(AsphaltType::Sma));
        assert_eq!(c.layer, Some(LayerCode::Surface));
        assert_eq!(c.load, Some(LoadClass::Normal));
    }

    #[test]
    fn test_pmb_detected_with_code() {
        let c = parse_material("AC 16 B S SG mit PmB 10/40-65A", "");
        assert!(c.is_pmb);
        assert_eq!(c.layer, Some(LayerCode::Binder));
    }

    // ========================================
    // あいまい一致・ヒント
    // ========================================

    #[test]
    fn test_generic_asphalt_with_hint() {
        let c = parse_material("Asphalt", "Deckschicht");
        assert_eq!(c.asphalt_type, Some(AsphaltType::Ac));
        assert_eq!(c.source, ClassificationSource::FuzzyText);
        assert_eq!(c.required_keyword, Some("Deck"));
    }

    #[test]
    fn test_misspelling_recovered() {
        let c = parse_material("Aspahlt Belag", "");
        assert_eq!(c.asphalt_type, Some(AsphaltType::Ac));
        assert_eq!(c.grain_mm, None);
    }

    #[test]
    fn test_gussasphalt_not_generic_ac() {
        let c = parse_material("Gussasphalt", "");
        assert_eq!(c.asphalt_type, Some(AsphaltType::Ma));
        assert_eq!(c.layer, Some(LayerCode::Surface));
    }

    #[test]
    fn test_hint_tragdeckschicht_is_td() {
        assert_eq!(layer_from_hint("Tragdeckschicht"), Some(LayerCode::BaseSurface));
        assert_eq!(layer_from_hint("Asphalttragschicht"), Some(LayerCode::Base));
        assert_eq!(layer_from_hint("Binderschicht"), Some(LayerCode::Binder));
        assert_eq!(layer_from_hint("Verschleißschicht"), Some(LayerCode::Surface));
        assert_eq!(layer_from_hint(""), None);
    }

    #[test]
    fn test_hint_only_classification() {
        let c = parse_material("Unbekannter Belag", "Binderschicht");
        assert_eq!(c.asphalt_type, None);
        assert_eq!(c.source, ClassificationSource::HintFallback);
        assert_eq!(c.required_keyword, Some("Binder"));
        assert!(!c.is_paving);
    }

    // ========================================
    // 非舗装カテゴリ
    // ========================================

    #[test]
    fn test_category_aggregate() {
        let c = parse_material("Schotter 0/32", "Frostschutzschicht");
        assert_eq!(c.alt_category, Some(AltCategory::Aggregate));
        assert!(!c.is_paving);
        assert!(!c.is_unknown());
    }

    #[test]
    fn test_category_insulation() {
        let c = parse_material("XPS Dämmplatte 100mm", "");
        assert_eq!(c.alt_category, Some(AltCategory::Insulation));
    }

    #[test]
    fn test_category_sealing() {
        let c = parse_material("Abdichtung Kunststoffbahn", "");
        assert_eq!(c.alt_category, Some(AltCategory::Sealing));
    }

    #[test]
    fn test_category_unknown() {
        let c = parse_material("Holzbohle", "");
        assert_eq!(c.alt_category, Some(AltCategory::Unknown));
        assert!(c.is_unknown());
    }

    #[test]
    fn test_empty_input_is_unknown() {
        let c = parse_material("   ", "Deckschicht");
        assert_eq!(c, MaterialClassification::default());
        assert_eq!(c.source, ClassificationSource::None);
    }

    // ========================================
    // コンテキスト行
    // ========================================

    #[test]
    fn test_context_line_full_code() {
        let c = parse_material("AC 11 D S", "");
        let line = c.context_line("AC 11 D S");
        assert!(line.starts_with("AC=Asphaltbeton, D=Asphaltdeckschicht"));
        assert!(line.contains("EPD muss 'Deck' enthalten"));
        assert!(line.contains("S=besondere Beanspruchung"));
        assert!(line.contains("min. 6.0"));
    }

    #[test]
    fn test_context_line_unknown() {
        let c = parse_material("Holzbohle", "");
        assert_eq!(c.context_line("Holzbohle"), "Unbekannte Bezeichnung: Holzbohle");
    }

    // ========================================
    // プロパティテスト
    // ========================================

    fn code_strategy() -> impl Strategy<Value = (AsphaltType, u32, Option<LayerCode>, Option<LoadClass>)> {
        (
            prop::sample::select(AsphaltType::ALL.to_vec()),
            1u32..64,
            prop::option::of(prop::sample::select(LayerCode::ALL.to_vec())),
            prop::option::of(prop::sample::select(LoadClass::ALL.to_vec())),
        )
    }

    proptest! {
        #[test]
        fn prop_grammar_case_and_whitespace_insensitive(
            (t, grain, layer, load) in code_strategy(),
            lead in "[ \t]{0,3}",
            gap in "[ ]{1,3}",
            lowercase in any::<bool>(),
        ) {
            let mut text = format!("{}{}{}{}", lead, t.code(), gap, grain);
            if let Some(l) = layer {
                text.push_str(&gap);
                text.push_str(l.code());
            }
            if let Some(l) = load {
                text.push_str(&gap);
                text.push_str(l.code());
            }
            if lowercase {
                text = text.to_lowercase();
            }

            let c = parse_material(&text, "");
            prop_assert_eq!(c.asphalt_type, Some(t));
            prop_assert_eq!(c.grain_mm, Some(grain));
            prop_assert_eq!(c.layer, layer.or(t.default_layer()));
            prop_assert_eq!(c.load, load);
            prop_assert_eq!(c.source, ClassificationSource::ExactCode);
        }
    }
}
