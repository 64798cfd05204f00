use clap::Parser;
use epd_matcher::catalog::{CandidatePool, CatalogClient, CatalogProvider, PoolSettings};
use epd_matcher::cli::{confidence_marker, Cli, Commands};
use epd_matcher::config::Config;
use epd_matcher::gateway::AzureChatGateway;
use epd_matcher::matcher::{MatchPipeline, Session, StageSet};
use epd_matcher::records::{self, RecordPaths};
use epd_matcher_common::parse_material;

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info,epd_matcher=debug,epd_matcher_common=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Match {
            id_folder,
            input_file,
            output_file,
            no_batch,
            max_results,
            no_prefilter,
            no_validation,
        } => {
            println!("🔎 epd-matcher - EPD照合\n");

            let paths = RecordPaths::new(&id_folder, &input_file, &output_file);
            println!("  入力: {}", paths.input.display());
            println!("  出力: {}\n", paths.output.display());

            let mut document = records::load_document(&paths.input)?;
            println!("✔ {}グループを読み込み\n", document.groups.len());
            config.validate()?;

            // 1. カタログ
            println!("[1/3] EPDカタログを読み込み中...");
            let client = CatalogClient::from_config(&config.catalog)?;
            let settings = PoolSettings {
                max_entries: config.matching.max_epd_in_prompt,
                detail_enrichment: config.matching.detail_matching,
                workers: config.matching.parallel_workers,
                labels: config.catalog.active_labels(),
                show_progress: true,
            };
            let pool = CandidatePool::prime(&client, &settings)?;
            let stats = pool.stats();
            println!("✔ {}件のEPDを読み込み", pool.len());
            if cli.verbose {
                println!(
                    "  一覧 {} / 重複 {} / 切り捨て {} / 詳細失敗 {}",
                    stats.listed, stats.duplicates_dropped, stats.truncated, stats.detail_failures
                );
            }
            println!();

            // 2. 照合
            let mut stages = StageSet::from_config(&config.matching);
            stages.batch_mode &= !no_batch;
            stages.prefilter &= !no_prefilter;
            stages.validation &= !no_validation;
            let max_results = max_results.unwrap_or(config.matching.max_results);

            let gateway = AzureChatGateway::new(&config.llm)?;
            println!(
                "[2/3] 照合中... ({}, {})",
                config.llm.deployment,
                if stages.batch_mode { "バッチ" } else { "1件ずつ" }
            );
            let session = Session::new(config, pool, Box::new(gateway));
            let inputs = document.inputs();
            let run = MatchPipeline::new(&session, stages)
                .verbose(cli.verbose)
                .match_batch(&inputs, max_results);

            for (record, result) in document.groups.iter().zip(&run.results) {
                println!("  {} ({})", record.name, record.material);
                if result.is_empty() {
                    println!("    ⚠️ 該当なし");
                }
                for candidate in result.candidates.iter().take(3) {
                    let name = session.pool.get(&candidate.id).map_or("?", |e| e.name.as_str());
                    let confidence = candidate
                        .validated_confidence
                        .map_or_else(|| "-".to_string(), |c| c.to_string());
                    println!(
                        "    {} {:>3}% {} {}",
                        confidence_marker(candidate.validated_confidence),
                        confidence,
                        candidate.id,
                        name
                    );
                }
            }
            println!("\n{}\n", run.summary.render());

            // 3. 保存
            println!("[3/3] 結果を保存中...");
            document.apply_results(&run.results)?;
            records::save_document(&paths.output, &document)?;
            println!("✔ 結果を保存: {}", paths.output.display());

            println!("\n✅ 照合完了");
        }

        Commands::Parse { material, layer } => {
            let classification = parse_material(&material, &layer);
            println!("材料: {}", material);
            println!("→ {}", classification.context_line(&material));
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }

        Commands::Count => {
            config.validate_catalog()?;
            let client = CatalogClient::from_config(&config.catalog)?;
            let labels = config.catalog.active_labels();
            let count = client.count(&labels)?;
            if labels.is_empty() {
                println!("EPD件数: {}", count);
            } else {
                println!("EPD件数: {} (ラベル: {})", count, labels.join(", "));
            }
        }

        Commands::Config { set_api_key, show } => {
            if let Some(key) = set_api_key {
                // 環境変数の値は保存しない
                let mut file_config = Config::load_from(&Config::config_path()?)?;
                file_config.set_api_key(key)?;
                println!("✔ APIキーを設定しました");
            }

            if show {
                println!("設定:");
                for line in config.display_lines() {
                    println!("{}", line);
                }
            }
        }
    }

    Ok(())
}
