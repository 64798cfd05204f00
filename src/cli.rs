use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "epd-matcher")]
#[command(about = "舗装材料の記述をEPDカタログに照合するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// IDフォルダの層レコードを照合して結果JSONを出力
    Match {
        /// IDフォルダ（input/ と output/ を含む）
        #[arg(required = true)]
        id_folder: PathBuf,

        /// 入力ファイル名（input/ 内）
        #[arg(long, default_value = "input.json")]
        input_file: String,

        /// 出力ファイル名（output/ 内）
        #[arg(long, default_value = "output.json")]
        output_file: String,

        /// 1材料ずつLLMに問い合わせる
        #[arg(long)]
        no_batch: bool,

        /// 1材料あたりの最大結果数（省略時は設定値）
        #[arg(short, long)]
        max_results: Option<usize>,

        /// プレフィルタを無効化（全候補をプロンプトに載せる）
        #[arg(long)]
        no_prefilter: bool,

        /// 信頼度検証を無効化
        #[arg(long)]
        no_validation: bool,
    },

    /// 材料記述の解析結果を表示（オフライン）
    Parse {
        /// 材料記述（例: "AC 11 D S"）
        #[arg(required = true)]
        material: String,

        /// 層名（例: "Deckschicht"）
        #[arg(short, long, default_value = "")]
        layer: String,
    },

    /// カタログのEPD件数を表示
    Count,

    /// 設定を表示/編集
    Config {
        /// LLMのAPIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

/// 信頼度の目安表示
pub fn confidence_marker(confidence: Option<u8>) -> &'static str {
    match confidence {
        Some(c) if c >= 85 => "🟢",
        Some(c) if c >= 60 => "🟡",
        Some(c) if c >= 40 => "🟠",
        _ => "🔴",
    }
}
