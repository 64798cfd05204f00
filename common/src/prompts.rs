//! プロンプト生成モジュール
//!
//! EPD照合用プロンプトを組み立てる:
//! - SYSTEM_PROMPT: システムプロンプト
//! - glossary_section: 材料コードの用語集
//! - candidate_list: 絞り込み済みの候補一覧（簡易/詳細）
//! - build_batch_prompt: 複数材料を1回で照合するプロンプト
//! - build_single_prompt: 1材料用プロンプト
//!
//! モデルに渡す文面はカタログに合わせてドイツ語。

use crate::glossary::{
    grades_for, AsphaltType, LayerCode, LoadClass, EXCLUSION_TERMS, PMB_KEYWORDS,
};
use crate::text::truncate_chars;
use crate::types::{BatchItem, BatchRequest, CatalogEntry};

/// システムプロンプト
pub const SYSTEM_PROMPT: &str =
    "Du bist Experte für Baumaterial-EPD-Matching. Antworte NUR mit JSON.";

/// タスク節に列挙する除外語の数
const EXCLUSION_PREVIEW: usize = 8;

/// プロンプト生成オプション
#[derive(Debug, Clone, Copy)]
pub struct PromptOptions {
    /// 1材料あたりの候補数
    pub max_results: usize,
    /// 候補一覧に詳細フィールドを含める
    pub detail_mode: bool,
    /// 用語集セクションを含める
    pub include_glossary: bool,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            detail_mode: false,
            include_glossary: true,
        }
    }
}

fn rule(title: &str) -> String {
    let line = "=".repeat(60);
    format!("\n{line}\n{title}\n{line}")
}

/// 材料コードの用語集
pub fn glossary_section() -> String {
    let mut out = rule("GLOSSAR: ASPHALT-BEZEICHNUNGEN (TL Asphalt-StB 07/13)");
    out.push_str("\nAufbau: [TYP] [GRÖSSTKORN] [SCHICHT] [BEANSPRUCHUNG], z.B. AC 16 B S\n");

    out.push_str("\nTypen:\n");
    for t in AsphaltType::ALL {
        let terms: Vec<&str> = t.search_terms().iter().take(4).copied().collect();
        out.push_str(&format!(
            "  {:4} = {:22} → EPD-Suche: {}\n",
            t.code(),
            t.display_name(),
            terms.join(", ")
        ));
    }

    out.push_str("\nSchichtcodes (KRITISCH):\n");
    for l in LayerCode::ALL {
        out.push_str(&format!(
            "  {:4} = {:24} → EPD-Name MUSS \"{}\" enthalten\n",
            l.code(),
            l.display_name(),
            l.required_keyword()
        ));
    }
    out.push_str("  Falscher Schichttyp im EPD-Namen = Confidence < 50\n");

    out.push_str("\nBeanspruchung:\n");
    for l in LoadClass::ALL {
        out.push_str(&format!("  {} = {} ({})\n", l.code(), l.display_name(), l.usage()));
    }

    out.push_str(&format!(
        "\nPolymermodifiziert (PmB) erkennbar an: {}\n",
        PMB_KEYWORDS.join(", ")
    ));

    out.push_str("\nGültige Sorten:\n");
    for t in AsphaltType::ALL {
        out.push_str(&format!("  {}: {}\n", t.code(), grades_for(t).join(", ")));
    }

    out.push_str(&format!(
        "\nNIEMALS für Asphalt matchen: {}\n",
        EXCLUSION_TERMS.join(", ")
    ));
    out
}

/// 候補一覧
///
/// 簡易モードは `i. ID: x | name`、詳細モードは名前・分類・説明を含む。
pub fn candidate_list(entries: &[&CatalogEntry], detail_mode: bool) -> String {
    let mut out = rule(&format!("VERFÜGBARE EPDs ({})", entries.len()));
    out.push('\n');

    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            if !detail_mode {
                return format!("{}. ID: {} | {}", i + 1, e.id, e.name);
            }
            let mut lines = vec![
                format!("{}. ID: {}", i + 1, e.id),
                format!("   Name: {}", truncate_chars(&e.name, 200)),
            ];
            if !e.classification.is_empty() {
                lines.push(format!("   Klassifizierung: {}", truncate_chars(&e.classification, 100)));
            }
            if let Some(desc) = e.technical_description.as_deref().filter(|d| !d.is_empty()) {
                lines.push(format!("   Beschreibung: {}", truncate_chars(desc, 200)));
            }
            if let Some(area) = e.application_area.as_deref().filter(|a| !a.is_empty()) {
                lines.push(format!("   Anwendung: {}", truncate_chars(area, 100)));
            }
            lines.join("\n")
        })
        .collect();

    out.push_str(&lines.join(if detail_mode { "\n\n" } else { "\n" }));
    out
}

/// 材料ヘッダ（層名・材料・コンテキスト）
fn material_header(item: &BatchItem) -> String {
    let layer = if item.input.layer_hint.trim().is_empty() {
        "Unbekannt"
    } else {
        item.input.layer_hint.trim()
    };
    format!(
        "SCHICHT {}: {}\nMaterial: {}\n→ {}",
        item.group,
        layer,
        item.input.material.trim(),
        item.classification.context_line(&item.input.material)
    )
}

/// 体積・IFC要素数
fn context_block(item: &BatchItem) -> String {
    let mut lines = Vec::new();
    if let Some(volume) = item.input.volume {
        lines.push(format!("- Volumen: {} m³", volume));
    }
    if item.input.guid_count > 0 {
        lines.push(format!("- IFC GUIDs: {} Elemente", item.input.guid_count));
    }
    if lines.is_empty() {
        String::new()
    } else {
        format!("\nKontext:\n{}", lines.join("\n"))
    }
}

fn confidence_bands(max_results: usize) -> String {
    format!(
        "Confidence-Bewertung:\n\
         - 85-100: Sehr guter Match (Name/Typ stimmt gut überein)\n\
         - 60-84:  Guter Match (thematisch passend)\n\
         - 40-59:  Akzeptabler Match (entfernt verwandt)\n\
         - 20-39:  Schwacher Match (nur wenn nötig um {max_results} zu erreichen)"
    )
}

fn exclusion_preview() -> String {
    EXCLUSION_TERMS[..EXCLUSION_PREVIEW.min(EXCLUSION_TERMS.len())].join(", ")
}

fn batch_task_section(batch: &BatchRequest, max_results: usize) -> String {
    let n = batch.len();
    let materials: Vec<String> = batch
        .items
        .iter()
        .map(|item| {
            let mut line = format!(
                "  {}. \"{}\" (Schicht: {})",
                item.group,
                item.input.material.trim(),
                item.input.layer_hint.trim()
            );
            if let Some(keyword) = item.classification.required_keyword {
                line.push_str(&format!(" → bevorzuge EPDs mit \"{}\"", keyword));
            }
            line
        })
        .collect();

    format!(
        r#"{header}

Finde die {max_results} besten EPD-Matches für JEDE der {n} Schichten.

Materialien:
{materials}

WICHTIGE REGELN:
1. Liefere bis zu {max_results} Matches pro Schicht - stoppe, wenn keine sinnvollen Matches mehr vorhanden sind
2. Verwende nur IDs aus der obigen EPD-Liste, exakt wie angegeben
3. Sortiere nach Relevanz (beste zuerst)
4. Gib für JEDE Schicht das Feld "schicht" mit ihrer Nummer an

{bands}

Ausschluss-Begriffe (Confidence < 20): {exclusions}

Antwort NUR als JSON:
{{
  "results": [
    {{
      "schicht": 1,
      "matches": [
        {{"id": 123, "begruendung": "Kurze Begründung", "confidence": 85}}
      ]
    }}
  ]
}}

KRITISCH: Ergebnisse für ALLE {n} Schichten liefern, jeweils mit "schicht" = Nummer aus der Materialliste."#,
        header = rule("AUFGABE"),
        materials = materials.join("\n"),
        bands = confidence_bands(max_results),
        exclusions = exclusion_preview(),
    )
}

fn single_task_section(item: &BatchItem, max_results: usize) -> String {
    let hint = item
        .classification
        .required_keyword
        .map(|k| format!("\nHinweis: Bevorzuge EPDs mit \"{}\" im Namen.\n", k))
        .unwrap_or_default();

    format!(
        r#"{header}

Finde die {max_results} besten EPD-Matches für: "{material}"
{hint}
WICHTIGE REGELN:
1. Liefere bis zu {max_results} Matches
2. Verwende nur IDs aus der EPD-Liste, exakt wie angegeben
3. Sortiere nach Relevanz

{bands}

Ausschluss-Begriffe (Confidence < 20): {exclusions}

Antwort NUR als JSON:
{{
  "matches": [
    {{"id": 123, "begruendung": "Begründung", "confidence": 85}}
  ]
}}"#,
        header = rule("AUFGABE"),
        material = item.input.material.trim(),
        bands = confidence_bands(max_results),
        exclusions = exclusion_preview(),
    )
}

/// バッチ照合プロンプト
///
/// # Arguments
/// * `batch` - 材料（グループ番号付き）
/// * `candidates` - 全材料の候補の和集合
/// * `options` - 生成オプション
pub fn build_batch_prompt(
    batch: &BatchRequest,
    candidates: &[&CatalogEntry],
    options: &PromptOptions,
) -> String {
    let headers: Vec<String> = batch.items.iter().map(material_header).collect();

    let mut prompt = rule(&format!("MATERIALIEN ({} Schichten)", batch.len()));
    prompt.push('\n');
    prompt.push_str(&headers.join("\n\n"));
    if options.include_glossary {
        prompt.push_str(&glossary_section());
    }
    prompt.push_str(&candidate_list(candidates, options.detail_mode));
    prompt.push('\n');
    prompt.push_str(&batch_task_section(batch, options.max_results));
    prompt
}

/// 1材料の照合プロンプト
pub fn build_single_prompt(
    item: &BatchItem,
    candidates: &[&CatalogEntry],
    options: &PromptOptions,
) -> String {
    let mut prompt = material_header(item);
    prompt.push_str(&context_block(item));
    if options.include_glossary {
        prompt.push_str(&glossary_section());
    }
    prompt.push_str(&candidate_list(candidates, options.detail_mode));
    prompt.push('\n');
    prompt.push_str(&single_task_section(item, options.max_results));
    prompt
}
