use anyhow::{Context, Result};
use devapply::core::{ConfigManager, Database};
use devapply::{start_web_server, RunOrchestrator, SchedulerService};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::{info, warn};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = dotenvy::dotenv().ok();

    // Optional JSON log file next to the console output
    let file_layer = match std::env::var("DEVAPPLY_LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(false)
                    .with_span_list(false),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("devapply=info,rocket=warn")),
        )
        .init();

    if let Some(path) = env_file {
        info!("Loaded environment file: {}", path.display());
    }

    let config = ConfigManager::load()?;
    config.ensure_directories().await?;

    info!("Starting DevApply");
    info!("Environment: {}", config.environment.name);
    info!("Database: {}", config.environment.database_path.display());
    info!(
        "Schedule: {} (failure policy {:?})",
        config.schedule.cron, config.scraping.failure_policy
    );
    if config.notifications.smtp_user.is_none() || config.notifications.smtp_pass.is_none() {
        warn!("SMTP_USER/SMTP_PASS not set; email notifications disabled");
    }
    if config.notifications.telegram_bot_token.is_none() {
        warn!("TELEGRAM_BOT_TOKEN not set; Telegram notifications disabled");
    }

    let db = Database::new(&config.environment.database_path).await?;
    let orchestrator = Arc::new(RunOrchestrator::from_config(&config, db)?);
    let scheduler = Arc::new(SchedulerService::new(
        orchestrator,
        config.schedule.cron.clone(),
    ));

    if config.schedule.autostart {
        scheduler.start().await?;
    } else {
        info!("Scheduler autostart disabled; use POST /api/scheduler/start");
    }

    start_web_server(Arc::clone(&scheduler), config.environment.port).await?;

    scheduler.stop().await?;
    info!("DevApply stopped");
    Ok(())
}
