//! Logs ChiefPay push notifications until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (chiefpay.toml in current directory)
//! cargo run -p chiefpay-watch --release
//!
//! # Watch the legacy SSE API from a known cursor
//! cargo run -p chiefpay-watch -- --profile legacy --from-ts 1200
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p chiefpay-watch
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `chiefpay.toml`)
//! - `CHIEFPAY_API_KEY`, `CHIEFPAY_BASE_URL`, `CHIEFPAY_PROFILE` - Overrides
//! - `RUST_LOG` - Log level filter (default: `info`)
//!
//! A `.env` file in the working directory is loaded first.

use std::path::PathBuf;

use chiefpay_http::{ChiefPayClient, ClientError};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use chiefpay_watch::config::{DEFAULT_CONFIG_PATH, WatchConfig};
use chiefpay_watch::log::LogEvents;

#[derive(Debug, Parser)]
#[command(name = "chiefpay-watch", version, about = "Log ChiefPay push notifications")]
struct Cli {
    /// Configuration file.
    #[arg(long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// API profile: latest, v1, merchant or legacy.
    #[arg(long)]
    profile: Option<String>,

    /// Resume cursor to start from.
    #[arg(long)]
    from_ts: Option<u64>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("chiefpay-watch failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = WatchConfig::load_from(&cli.config)?;
    if let Some(profile) = cli.profile {
        config.profile = profile;
    }
    if let Some(ts) = cli.from_ts {
        config.ts = ts;
    }
    tracing::info!(
        base_url = %config.base_url,
        profile = %config.profile,
        ts = config.ts,
        "Loaded configuration"
    );

    let client = ChiefPayClient::new(config.client_config()?.with_handler(LogEvents))?;
    let mut events = client.subscribe();

    match client.update_rates().await {
        Ok(rates) => tracing::debug!(count = rates.len(), "initial rates"),
        Err(ClientError::RatesThrottled { .. }) => {}
        Err(e) => tracing::warn!(error = %e, "initial rate pull failed"),
    }

    client.connect().await;
    tracing::info!(
        endpoint = %client.push_endpoint(),
        transport = ?client.transport_kind(),
        "Watching push channel"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => tracing::trace!(kind = %event.kind(), "event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event receiver lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    client.disconnect().await;
    tracing::info!(ts = client.ts(), "Stopped; resume with --from-ts");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received Ctrl-C, shutting down...");
            }
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl-C, shutting down...");
    }

    Ok(())
}
