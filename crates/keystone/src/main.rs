//! # Keystone - CID relay
//!
//! Accepts an installation ID and a Turnstile token from the browser,
//! verifies the token with Cloudflare, and relays the lookup to getcid.
//! Successful lookups are cached for 30 days.
//!
//! ## Architecture
//! ```text
//! Browser → Keystone → Turnstile siteverify
//!              ↓    ↘
//!           Redis    getcid.info
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod captcha;
mod client_ip;
mod config;
mod lookup;
mod outbound;
mod ratelimit;
mod routes;
mod service;
mod state;
mod store;
#[cfg(test)]
mod testing;

use config::{AppConfig, Overrides};
use state::AppState;

/// Keystone - Turnstile-gated CID relay
#[derive(Parser, Debug)]
#[command(name = "keystone")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/keystone.toml")]
    config: String,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Turnstile secret key
    #[arg(long, env = "TURNSTILE_SECRET", hide_env_values = true)]
    turnstile_secret: Option<String>,

    /// getcid API token
    #[arg(long, env = "GETCID_TOKEN", hide_env_values = true)]
    getcid_token: Option<String>,

    /// Directory to serve the front-end from
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up .env before clap reads the environment
    let dotenv = dotenvy::dotenv();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("🔑 Starting Keystone v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // Load configuration
    let config_path = args.config.clone();
    let config = AppConfig::load(
        &config_path,
        Overrides {
            listen: args.listen,
            redis_url: args.redis_url,
            turnstile_secret: args.turnstile_secret,
            getcid_token: args.getcid_token,
            static_dir: args.static_dir,
        },
    )?;
    info!("📋 Configuration loaded from {}", config_path);
    info!(
        identifier = ?config.identifier,
        cache = ?config.cache_backend(),
        rate_limit = config.rate_limit.enabled,
        "Relay settings"
    );
    if config.secrets.getcid_token.is_none() {
        tracing::warn!("GETCID_TOKEN is not set, lookups will answer 503");
    }

    // Initialize application state
    let state = AppState::new(&config).await?;

    // Build router
    let app = routes::create_router(state, config.static_dir.as_deref());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("🚀 Keystone listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("🛑 Shutdown signal received");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("Server error")?;

    info!("👋 Keystone shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
