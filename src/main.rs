//! Susu Backend Service
//!
//! Entry point for the Susu savings-platform ledger. Boots configuration,
//! logging, the database pool, and migrations, then runs the daily
//! recurring-savings batch — the external scheduler invokes this binary
//! once per calendar day.

use std::sync::Arc;
use susu_backend::config::AppConfig;
use susu_backend::database::{create_pool, run_migrations};
use susu_backend::error::{AppError, AppResult};
use susu_backend::services::{LogNotifier, NotificationSink, WebhookNotifier};
use susu_backend::AppState;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("susu_backend={},sqlx=warn", config.log_level).into()
            }),
        )
        .init();

    info!(environment = %config.environment, "starting susu backend");

    let pool = create_pool(&config.database).await?;
    run_migrations(&pool, None).await?;
    info!("database ready");

    let notifier: Arc<dyn NotificationSink> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };

    let state = AppState::new(pool, notifier);

    // One batch pass per invocation
    let summary = state.automation.run_daily().await?;
    info!(
        success = summary.success,
        failed = summary.failed,
        "daily automation complete"
    );
    for failure in &summary.errors {
        warn!(goal_id = %failure.goal_id, error = %failure.error, "goal debit failed");
    }

    Ok(())
}
