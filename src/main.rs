//! borderwatch server
//!
//! Run with: cargo run
//! Single check: cargo run -- --once
//!
//! Environment variables:
//! - BORDERWATCH_HOST: Bind address (default: 0.0.0.0)
//! - BORDERWATCH_PORT: Port number (default: 8080)
//! - BORDERWATCH_FEED_URL: Wait time feed (default: https://bwt.cbp.gov/api/waittimes)
//! - BORDERWATCH_PORT_NAME / BORDERWATCH_BORDER: Monitored crossing (default: San Ysidro / Mexican Border)
//! - BORDERWATCH_INTERVAL_SECS: Seconds between checks (default: 300)
//! - BORDERWATCH_FETCH_TIMEOUT_SECS: Feed request timeout (default: 10)
//! - BORDERWATCH_SUMMARY_EVERY: Log delivery stats every N checks (default: 10)
//! - BORDERWATCH_RULES_PATH: JSON file for alert rules (default: in-memory)
//! - BORDERWATCH_SMTP_HOST, _SMTP_PORT, _SMTP_USERNAME, _SMTP_PASSWORD, _SMTP_FROM:
//!   SMTP relay; without a host, notifications are only logged
//! - RUST_LOG: Log level (default: info)

use std::sync::Arc;

use borderwatch::api::{run_server, AppState};
use borderwatch::{Engine, EngineConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "borderwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let once = std::env::args().skip(1).any(|a| a == "--once");

    let config = EngineConfig::from_env()?;

    tracing::info!("borderwatch configuration:");
    tracing::info!("  Feed: {}", config.feed_url);
    tracing::info!("  Crossing: {} ({})", config.port_name, config.border);
    tracing::info!("  Check interval: {} seconds", config.interval_secs);
    tracing::info!("  Fetch timeout: {} seconds", config.fetch_timeout_secs);
    match &config.rules_path {
        Some(path) => tracing::info!("  Rules: {}", path.display()),
        None => tracing::info!("  Rules: in-memory"),
    }
    match &config.smtp {
        Some(smtp) => tracing::info!("  SMTP relay: {}:{}", smtp.host, smtp.port),
        None => tracing::info!("  SMTP relay: none (dry run)"),
    }

    let Engine {
        mut scheduler,
        dispatcher,
        store,
        stats,
    } = Engine::from_config(&config)?;

    if once {
        let result = scheduler.execute_cycle().await;
        match result {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            Err(e) => {
                eprintln!("check failed ({}): {}", e.stage(), e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let handle = scheduler.start();

    let state = Arc::new(AppState {
        store,
        stats,
        dispatcher,
    });

    let served = run_server(&config.host, config.port, state, shutdown_signal()).await;

    tracing::info!("Stopping border checker worker...");
    handle.stop().await?;

    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
