use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use trove_provider::CatalogProvider;
use trove_server::{AuthConfig, ServerConfig};

#[derive(Parser, Debug)]
#[command(
    name = "trove",
    version,
    about = "Resource catalog tool server over JSON-RPC HTTP and SSE"
)]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Path to the JSON catalog file.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Seconds between heartbeat frames.
    #[arg(long, default_value_t = 30)]
    heartbeat_interval: u64,

    /// Seconds of inactivity before a stream session is reclaimed.
    #[arg(long, default_value_t = 90)]
    idle_timeout: u64,

    /// Bearer token required on protected routes.
    #[arg(long, env = "TROVE_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Comma-separated additional accepted tokens.
    #[arg(long, env = "TROVE_AUTH_TOKENS", hide_env_values = true)]
    auth_tokens: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let provider = match &cli.catalog {
        Some(path) => CatalogProvider::from_path(path)?,
        None => {
            tracing::warn!("no --catalog given, serving an empty catalog");
            CatalogProvider::empty()
        }
    };

    let auth = AuthConfig::from_values(cli.auth_token, cli.auth_tokens);
    if auth.is_open() {
        tracing::warn!("no credentials configured, running in public mode");
    }

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        heartbeat_interval_secs: cli.heartbeat_interval,
        idle_timeout_secs: cli.idle_timeout,
        auth,
        ..ServerConfig::default()
    };

    let handle = trove_server::start(config, Arc::new(provider)).await?;
    tracing::info!(port = handle.port(), "trove ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.shutdown_and_wait().await;
    Ok(())
}
