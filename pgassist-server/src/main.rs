use std::sync::Arc;

use clap::Parser;
use pgassist_core::PgAssistConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use pgassist_server::http::{self, HttpState};
use pgassist_server::sessions::{self, SessionStore};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "pgassist.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config
    let config = match PgAssistConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let store = Arc::new(SessionStore::new());

    tokio::spawn(sessions::run_session_sweep(
        store.clone(),
        config.session.clone(),
        tx.subscribe(),
    ));

    let state = Arc::new(HttpState::new(config, store)?);

    if let Err(e) = http::start_http_server(state, tx.subscribe()).await {
        eprintln!("HTTP server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
