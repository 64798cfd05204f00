//! 舗装材料の用語集
//!
//! TL Asphalt-StB 07/13 に基づくアスファルト種別・層コード・荷重区分と、
//! EPD照合で使うキーワード表:
//! - AsphaltType / LayerCode / LoadClass: 材料コードの構成要素
//! - AltCategory: 舗装材以外の材料カテゴリ（骨材・断熱材・防水材）
//! - EXCLUSION_TERMS: アスファルト照合で常に除外する語
//! - ASPHALT_GRADES: 有効な36種の品種表示

use serde::{Deserialize, Serialize};

/// アスファルト種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsphaltType {
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "SMA")]
    Sma,
    #[serde(rename = "MA")]
    Ma,
    #[serde(rename = "PA")]
    Pa,
}

impl AsphaltType {
    pub const ALL: [AsphaltType; 4] = [Self::Ac, Self::Sma, Self::Ma, Self::Pa];

    /// あいまい検索の順序（固有名を先に、汎用のACを最後に）
    pub const FUZZY_ORDER: [AsphaltType; 4] = [Self::Ma, Self::Sma, Self::Pa, Self::Ac];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Ac => "AC",
            Self::Sma => "SMA",
            Self::Ma => "MA",
            Self::Pa => "PA",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code().eq_ignore_ascii_case(code))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ac => "Asphaltbeton",
            Self::Sma => "Splittmastixasphalt",
            Self::Ma => "Gussasphalt",
            Self::Pa => "Offenporiger Asphalt",
        }
    }

    /// EPD名の検索語
    pub fn search_terms(&self) -> &'static [&'static str] {
        match self {
            Self::Ac => &[
                "Asphaltbeton", "Asphalt", "Bitumen", "bituminös",
                "Asphaltmischgut", "Heißasphalt", "Walzasphalt",
            ],
            Self::Sma => &[
                "Splittmastixasphalt", "Splittmastix", "SMA", "Stone Mastic", "Mastixasphalt",
            ],
            Self::Ma => &["Gussasphalt", "Mastic Asphalt", "Asphaltmastix", "Gießasphalt", "MA"],
            Self::Pa => &[
                "Offenporiger Asphalt", "OPA", "Drainasphalt", "Porous Asphalt",
                "Drainageschicht", "lärmmindernd", "Flüsterasphalt", "PA",
            ],
        }
    }

    /// 材料テキストからの種別推定に使う語（誤記を含む）
    pub fn fuzzy_terms(&self) -> &'static [&'static str] {
        match self {
            Self::Ac => GENERIC_ASPHALT_TERMS,
            Self::Sma => &["splittmastix", "sma", "mastix"],
            Self::Ma => &["gussasphalt", "gießasphalt", "mastic asphalt", "asphaltmastix"],
            Self::Pa => &["offenporig", "drainasphalt", "opa", "flüsterasphalt"],
        }
    }

    /// 層コードを持たない種別の既定層（表層）
    pub fn default_layer(&self) -> Option<LayerCode> {
        match self {
            Self::Ac => None,
            Self::Sma | Self::Ma | Self::Pa => Some(LayerCode::Surface),
        }
    }
}

/// 層コード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerCode {
    #[serde(rename = "T")]
    Base,
    #[serde(rename = "B")]
    Binder,
    #[serde(rename = "D")]
    Surface,
    #[serde(rename = "TD")]
    BaseSurface,
}

impl LayerCode {
    pub const ALL: [LayerCode; 4] = [Self::Base, Self::Binder, Self::Surface, Self::BaseSurface];

    /// 層名ヒントの照合順（"Tragdeckschicht" を T や D と誤認しないよう TD が先）
    pub const HINT_ORDER: [LayerCode; 4] = [Self::BaseSurface, Self::Binder, Self::Surface, Self::Base];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Base => "T",
            Self::Binder => "B",
            Self::Surface => "D",
            Self::BaseSurface => "TD",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code().eq_ignore_ascii_case(code))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Base => "Asphalttragschicht",
            Self::Binder => "Asphaltbinder",
            Self::Surface => "Asphaltdeckschicht",
            Self::BaseSurface => "Asphalttragdeckschicht",
        }
    }

    /// EPD名が必ず含むべき語
    pub fn required_keyword(&self) -> &'static str {
        match self {
            Self::Base => "Trag",
            Self::Binder => "Binder",
            Self::Surface => "Deck",
            Self::BaseSurface => "Tragdeck",
        }
    }

    /// 層名ヒントの表記ゆれ（小文字）
    pub fn name_variants(&self) -> &'static [&'static str] {
        match self {
            Self::Base => &["tragschicht", "trag"],
            Self::Binder => &["binderschicht", "binder"],
            Self::Surface => &["deckschicht", "deck", "decke", "verschleiß"],
            Self::BaseSurface => &["tragdeckschicht", "tragdeck"],
        }
    }
}

/// 荷重区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadClass {
    #[serde(rename = "S")]
    Heavy,
    #[serde(rename = "N")]
    Normal,
    #[serde(rename = "L")]
    Light,
}

impl LoadClass {
    pub const ALL: [LoadClass; 3] = [Self::Heavy, Self::Normal, Self::Light];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Heavy => "S",
            Self::Normal => "N",
            Self::Light => "L",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code().eq_ignore_ascii_case(code))
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Heavy => "besondere Beanspruchung",
            Self::Normal => "normale Beanspruchung",
            Self::Light => "leichte Beanspruchung",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Self::Heavy => "Autobahnen, Bundesstraßen, Industrieflächen",
            Self::Normal => "Landesstraßen, Kreisstraßen",
            Self::Light => "Wohnstraßen, Radwege, Parkplätze",
        }
    }
}

/// アスファルト・ビチューメン系の汎用語
pub const GENERIC_ASPHALT_TERMS: &[&str] = &[
    "asphalt", "aspahlt", "bitumen", "bituminös", "bituminos", "schwarzdecke", "heißmischgut",
];

/// ポリマー改質アスファルト（PmB）の判定語（大文字で比較）
pub const PMB_KEYWORDS: &[&str] = &[
    "PMB", "POLYMER", "MODIFIZIERT", "ELASTOMER",
    "10/40-65", "25/55-55", "45/80-50", "40/100-65",
];

/// アスファルト照合で常に除外する語
pub const EXCLUSION_TERMS: &[&str] = &[
    "Betonpflaster", "Pflasterstein", "Betonstein", "Betonsteinpflaster", "Verbundpflaster",
    "C20/25", "C25/30", "C30/37", "C35/45", "C40/50", "C45/55", "C50/60",
    "Zement", "Mörtel", "Estrich", "Kalksandstein", "Mauerwerk", "Ziegel",
    "Anhydrit", "Gips", "HGT", "Hydraulisch gebunden",
    "Frostschutzschicht", "Schottertragschicht",
];

/// 他カテゴリ判定用の舗装材シグナル語
///
/// "bitumen" 単体は防水シートにも現れるため含めない。
pub const PAVING_SIGNAL_TERMS: &[&str] = &[
    "asphaltbeton", "asphaltdeck", "asphalttrag", "asphaltbinder", "asphaltmischgut",
    "splittmastix", "gussasphalt", "walzasphalt",
];

/// 舗装材以外の材料カテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltCategory {
    Aggregate,
    Insulation,
    Sealing,
    Unknown,
}

impl AltCategory {
    /// 判定対象のカテゴリ（Unknown を除く）
    pub const CLASSIFIABLE: [AltCategory; 3] = [Self::Insulation, Self::Sealing, Self::Aggregate];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Aggregate => "Gesteinskörnung / ungebundene Schicht",
            Self::Insulation => "Dämmstoff",
            Self::Sealing => "Abdichtung",
            Self::Unknown => "unbekannt",
        }
    }

    /// 材料テキストからカテゴリを判定する語
    pub fn detection_terms(&self) -> &'static [&'static str] {
        match self {
            Self::Aggregate => &[
                "schotter", "kies", "splitt", "brechsand", "sand", "frostschutz",
                "gesteinskörnung", "mineralgemisch", "fss", "sts", "recycling",
            ],
            Self::Insulation => &[
                "dämm", "xps", "eps", "schaumglas", "mineralwolle", "polystyrol", "perimeter",
            ],
            Self::Sealing => &[
                "abdichtung", "dichtungsbahn", "kunststoffbahn", "membran", "dichtschicht", "folie",
            ],
            Self::Unknown => &[],
        }
    }

    /// EPD名のホワイトリスト
    pub fn whitelist(&self) -> &'static [&'static str] {
        match self {
            Self::Aggregate => &[
                "schotter", "kies", "splitt", "sand", "gesteinskörnung", "frostschutz",
                "mineralgemisch", "brechsand", "recycling", "tragschicht ohne bindemittel",
            ],
            Self::Insulation => &[
                "dämm", "xps", "eps", "schaumglas", "mineralwolle", "polystyrol", "perimeter",
            ],
            Self::Sealing => &[
                "abdicht", "dichtung", "bahn", "membran", "folie", "schweißbahn",
            ],
            Self::Unknown => &[],
        }
    }

    /// カテゴリ固有の除外語
    pub fn exclusions(&self) -> &'static [&'static str] {
        match self {
            Self::Aggregate => &["asphalt", "bitumen", "beton", "dämm", "abdicht", "zement"],
            Self::Insulation => &["asphalt", "bitumen", "schotter", "kies", "splitt", "pflaster"],
            Self::Sealing => &[
                "asphaltbeton", "asphaltdeck", "asphalttrag", "asphaltbinder",
                "schotter", "kies", "dämm",
            ],
            Self::Unknown => &[],
        }
    }

    /// このカテゴリに属することを示す語（検証で他カテゴリとの食い違い判定に使う）
    pub fn signal_terms(&self) -> &'static [&'static str] {
        match self {
            Self::Aggregate => &["schotter", "kies", "frostschutz", "gesteinskörnung", "mineralgemisch"],
            Self::Insulation => &[
                "dämmung", "dämmstoff", "dämmplatte", "xps", "eps", "schaumglas",
                "mineralwolle", "polystyrol",
            ],
            Self::Sealing => &["abdichtung", "dichtungsbahn", "schweißbahn", "membran"],
            Self::Unknown => &[],
        }
    }
}

/// 有効な品種表示
#[derive(Debug, Clone, PartialEq)]
pub struct AsphaltGrade {
    pub designation: &'static str,
    pub asphalt_type: AsphaltType,
    pub grain_mm: u32,
    pub layer: LayerCode,
    pub load: Option<LoadClass>,
    pub binders: &'static [&'static str],
    pub min_binder_content: f32,
}

macro_rules! grade {
    ($d:literal, $t:ident, $g:literal, $l:ident, $load:expr, [$($b:literal),*], $m:literal) => {
        AsphaltGrade {
            designation: $d,
            asphalt_type: AsphaltType::$t,
            grain_mm: $g,
            layer: LayerCode::$l,
            load: $load,
            binders: &[$($b),*],
            min_binder_content: $m,
        }
    };
}

const S: Option<LoadClass> = Some(LoadClass::Heavy);
const N: Option<LoadClass> = Some(LoadClass::Normal);
const L: Option<LoadClass> = Some(LoadClass::Light);

/// TL Asphalt-StB 07/13 の品種（36種）
pub const ASPHALT_GRADES: &[AsphaltGrade] = &[
    grade!("AC 32 T S", Ac, 32, Base, S, ["50/70", "30/45"], 3.8),
    grade!("AC 22 T S", Ac, 22, Base, S, ["50/70", "30/45"], 3.8),
    grade!("AC 16 T S", Ac, 16, Base, S, ["50/70", "30/45"], 4.0),
    grade!("AC 32 T N", Ac, 32, Base, N, ["70/100", "50/70"], 4.0),
    grade!("AC 22 T N", Ac, 22, Base, N, ["70/100", "50/70"], 4.0),
    grade!("AC 16 T N", Ac, 16, Base, N, ["70/100", "50/70"], 4.0),
    grade!("AC 32 T L", Ac, 32, Base, L, ["70/100"], 4.0),
    grade!("AC 22 T L", Ac, 22, Base, L, ["70/100"], 4.0),
    grade!("AC 16 T L", Ac, 16, Base, L, ["70/100"], 4.2),
    grade!("AC 16 TD", Ac, 16, BaseSurface, None, ["70/100", "50/70", "160/220"], 5.4),
    grade!("AC 22 B S", Ac, 22, Binder, S, ["25/55-55", "30/45", "10/40-65"], 4.2),
    grade!("AC 16 B S", Ac, 16, Binder, S, ["25/55-55", "30/45", "10/40-65"], 4.4),
    grade!("AC 16 B N", Ac, 16, Binder, N, ["50/70", "30/45"], 4.4),
    grade!("AC 11 B N", Ac, 11, Binder, N, ["50/70"], 4.6),
    grade!("AC 16 D S", Ac, 16, Surface, S, ["25/55-55", "50/70", "10/40-65"], 5.4),
    grade!("AC 11 D S", Ac, 11, Surface, S, ["25/55-55", "50/70"], 6.0),
    grade!("AC 8 D S", Ac, 8, Surface, S, ["25/55-55", "50/70"], 6.2),
    grade!("AC 11 D N", Ac, 11, Surface, N, ["50/70", "70/100"], 6.2),
    grade!("AC 8 D N", Ac, 8, Surface, N, ["50/70", "70/100"], 6.4),
    grade!("AC 11 D L", Ac, 11, Surface, L, ["70/100", "50/70"], 6.4),
    grade!("AC 8 D L", Ac, 8, Surface, L, ["70/100"], 6.6),
    grade!("AC 5 D L", Ac, 5, Surface, L, ["70/100"], 7.0),
    grade!("SMA 11 S", Sma, 11, Surface, S, ["25/55-55", "50/70"], 6.6),
    grade!("SMA 8 S", Sma, 8, Surface, S, ["25/55-55", "50/70"], 7.2),
    grade!("SMA 5 S", Sma, 5, Surface, S, ["45/80-50", "50/70", "25/55-55"], 7.4),
    grade!("SMA 8 N", Sma, 8, Surface, N, ["50/70", "70/100", "45/80-50"], 7.2),
    grade!("SMA 5 N", Sma, 5, Surface, N, ["50/70", "70/100", "45/80-50"], 7.4),
    grade!("MA 11 S", Ma, 11, Surface, S, ["20/30", "30/45", "10/40-65", "25/55-55"], 6.8),
    grade!("MA 8 S", Ma, 8, Surface, S, ["20/30", "30/45", "10/40-65", "25/55-55"], 7.0),
    grade!("MA 5 S", Ma, 5, Surface, S, ["20/30", "30/45", "10/40-65", "25/55-55"], 7.0),
    grade!("MA 11 N", Ma, 11, Surface, N, ["30/45", "25/55-55"], 6.8),
    grade!("MA 8 N", Ma, 8, Surface, N, ["30/45", "25/55-55"], 7.0),
    grade!("MA 5 N", Ma, 5, Surface, N, ["30/45", "25/55-55"], 7.5),
    grade!("PA 16", Pa, 16, Surface, None, ["40/100-65"], 5.5),
    grade!("PA 11", Pa, 11, Surface, None, ["40/100-65"], 6.0),
    grade!("PA 8", Pa, 8, Surface, None, ["40/100-65"], 6.5),
];

/// 材料表示に前方一致する品種を探す（最長一致）
pub fn find_grade(text: &str) -> Option<&'static AsphaltGrade> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    ASPHALT_GRADES
        .iter()
        .filter(|g| normalized.starts_with(g.designation))
        .max_by_key(|g| g.designation.len())
}

/// 種別ごとの品種表示一覧
pub fn grades_for(asphalt_type: AsphaltType) -> Vec<&'static str> {
    ASPHALT_GRADES
        .iter()
        .filter(|g| g.asphalt_type == asphalt_type)
        .map(|g| g.designation)
        .collect()
}
