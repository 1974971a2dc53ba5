use ai_etl::config::app_config::{LoadConfig, SourceConfig};
use ai_etl::config::{AppConfig, CliArgs};
use ai_etl::utils::error::{EtlError, ErrorSeverity};
use ai_etl::utils::logger;
use ai_etl::EtlApp;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting ai-etl");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = match AppConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 組裝時會先驗證配置
    let app = match EtlApp::from_config(config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    display_config_summary(app.config(), &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be written");
        match app.preview().await {
            Ok(output) => {
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }
            Err(e) => exit_with(e),
        }
    }

    match app.run().await {
        Ok(summary) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("✅ ETL process completed successfully!");
            println!("📁 Output saved to: {}", summary.location);
            println!(
                "📊 {} records in, {} records out, {} ms",
                summary.extracted_count, summary.loaded_count, summary.duration_ms
            );
            if !summary.failed_steps.is_empty() {
                println!("⚠️ Failed steps: {:?}", summary.failed_steps);
            }
            if args.verbose {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: EtlError) -> ! {
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn display_config_summary(config: &AppConfig, args: &CliArgs) {
    println!("📋 Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    match &config.source {
        SourceConfig::Api { endpoint, .. } => println!("  Source: API {}", endpoint),
        SourceConfig::File { path, .. } => println!("  Source: file {}", path),
        SourceConfig::Record { record_id } => println!("  Source: record {}", record_id),
    }
    println!("  Steps: {:?}", config.transformations.requested_steps());
    match &config.load {
        LoadConfig::File { path, compress, .. } => {
            println!("  Output: {}{}", path, if *compress { " (ZIP)" } else { "" })
        }
        LoadConfig::Record => println!("  Output: record store {}", config.storage.records_dir),
    }
    match &config.generation {
        Some(generation) => println!(
            "  Generation: {:?} {} ({})",
            generation.provider, generation.endpoint, generation.model
        ),
        None => println!("  Generation: not configured"),
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
