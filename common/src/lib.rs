//! EPD Matcher Common Library
//!
//! 材料記述とEPDカタログの照合ロジック（I/Oを含まない）

pub mod aggregate;
pub mod error;
pub mod glossary;
pub mod material;
pub mod prefilter;
pub mod prompts;
pub mod response;
pub mod text;
pub mod types;
pub mod validator;

pub use error::{Error, Result};
pub use material::{parse_material, ClassificationSource, MaterialClassification};
pub use prefilter::{filter_batch, filter_candidates, BatchFilter, FilterResult, FilterStats};
pub use prompts::{build_batch_prompt, build_single_prompt, PromptOptions, SYSTEM_PROMPT};
pub use response::{parse_batch_response, parse_single_response, ParsedResponse, ResponseStatus};
pub use types::{
    BatchItem, BatchRequest, CatalogEntry, LayerMatchResult, MatchCandidate, MaterialInput, RawMatch,
};
pub use validator::{
    validate, validate_batch, CatalogLookup, ValidatedGroup, ValidationReason, ValidationThresholds,
};
