use clap::Parser;
use evento_sync::utils::error::ErrorSeverity;
use evento_sync::utils::{logger, validation::Validate};
use evento_sync::{CliConfig, EventoClient, MoodleClient, SyncConfig, SyncError, SyncPipeline, TargetSettings};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if cli.verbose {
        tracing::debug!("Show extensive messages");
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Sync failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: &CliConfig) -> Result<(), SyncError> {
    // 選項錯誤在開始同步前就中止
    let options = cli.options();
    options.validate()?;

    let config = SyncConfig::from_file(&cli.config).map_err(|e| SyncError::ConfigError {
        message: format!("cannot load '{}': {}", cli.config, e),
    })?;
    config.validate()?;
    tracing::debug!("Configuration loaded from {}", cli.config);

    let source = EventoClient::new(&config.source)?;
    let target = MoodleClient::new(&config.target)?;
    let settings = TargetSettings {
        course_category: config.target.course_category,
        auth_method: config.target.auth_method.clone(),
        enrol_method: config.target.enrol_method.clone(),
    };

    let stdout = std::io::stdout();
    let mut pipeline = SyncPipeline::new(source, target, options, settings, stdout.lock());
    pipeline.run().await?;

    Ok(())
}
