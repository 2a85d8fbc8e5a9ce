mod browser;
mod config;
mod engine;
mod errors;
mod llm_client;
mod resume;
mod routes;
mod state;
mod vision;
mod worker;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, RunConfig};
use crate::routes::build_router;
use crate::state::AppState;
use crate::worker::WorkerLauncher;

#[derive(Parser)]
#[command(name = "autobot", version, about = "Job application autofill agent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API that accepts run configurations (default)
    Serve,
    /// Run one automation session in the foreground using the persisted configuration
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Run => run_once(config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting autobot API v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState {
        launcher: Arc::new(WorkerLauncher::new(config.clone())),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_once(config: Config) -> Result<()> {
    info!("Starting autobot run v{}", env!("CARGO_PKG_VERSION"));

    let run = RunConfig::load(&config.config_path)?;
    worker::execute(&config, &run).await?;
    Ok(())
}
