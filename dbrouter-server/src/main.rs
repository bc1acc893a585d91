//! dbrouter Server - Headless Daemon
//!
//! Builds the router from `DB_*` environment variables and exposes:
//! - `/api/status`, `/api/health/check`, `/api/sync/*` for operators
//! - `/api/metrics` in Prometheus text format
//! - `/healthz` (liveness) and `/readyz` (healthy master available)
//!
//! Access via: http://localhost:8046

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod cli;
mod commands;
mod metrics;
mod router;
mod server_utils;
mod state;

#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command.take().unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cli).await,
        Commands::Status { json } => commands::handle_status(json).await,
        Commands::Check => commands::handle_check().await,
    }
}

async fn serve(cli: &Cli) -> Result<()> {
    info!("dbrouter Server starting on port {}...", cli.port);

    let metrics = metrics::install()?;
    let db = dbrouter_core::DbRouter::from_env()?;
    db.init().await?;

    let state = AppState::new(db.clone(), metrics);
    let app = router::build_router(state);
    let listener = server_utils::create_listener(cli.bind, cli.port).await?;

    info!("API available at http://{}:{}/api/", cli.bind, cli.port);

    axum::serve(listener, app).with_graceful_shutdown(server_utils::shutdown_signal()).await?;

    db.shutdown().await;
    info!("Server stopped");
    Ok(())
}
