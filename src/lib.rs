//! EPD Matcher
//!
//! 舗装材料の記述をEPDカタログに照合する。照合ロジック本体は `epd_matcher_common`、
//! このクレートはカタログAPI・LLM・ファイル入出力とパイプラインの組み立てを担う。

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod matcher;
pub mod records;
