mod admin;
mod bootstrap;
mod health;
mod http;
mod lambda;
mod webhook;

use anyhow::{anyhow, Result};
use fomo_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use fomo_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    if lambda::is_lambda_environment() {
        tracing::info!(
            event_name = "system.server.started",
            correlation_id = "bootstrap",
            mode = "lambda",
            "fomo-server handling function url invocations"
        );
        return lambda::run(app.gateway.clone()).await.map_err(|error| anyhow!(error));
    }

    http::serve(app, wait_for_shutdown()).await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "fomo-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
