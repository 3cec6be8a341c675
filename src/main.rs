use blocklist_sync::utils::logger;
use blocklist_sync::{CliArgs, Reporter, SyncConfig, SyncEngine, SyncError};
use clap::Parser;

fn fail(e: &SyncError) -> ! {
    tracing::error!(
        "❌ Sync failed: {} (Category: {:?})",
        e,
        e.category()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在時直接略過
    let _ = dotenvy::dotenv();

    let cli = CliArgs::parse();
    let cli_verbose = cli.verbose.unwrap_or(false);
    let cli_json = cli.json_logs;

    let config = match SyncConfig::resolve(cli) {
        Ok(config) => config,
        Err(e) => {
            logger::init_logger(cli_verbose, cli_json);
            fail(&e);
        }
    };

    logger::init_logger(config.verbose, config.json_logs);

    tracing::info!("Starting blocklist-sync");
    tracing::debug!("Config: {:?}", config);

    let engine = match SyncEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => fail(&e),
    };
    let mut reporter = Reporter::stdout(config.verbose);

    match engine.run(&mut reporter).await {
        Ok(outcome) if outcome.is_success() => Ok(()),
        Ok(outcome) => {
            let failed = outcome.summary.stats.failed_add + outcome.summary.stats.failed_remove;
            tracing::error!("❌ {} domain mutation(s) failed", failed);
            std::process::exit(1);
        }
        Err(e) => fail(&e),
    }
}
