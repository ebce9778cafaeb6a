//! Rookery server entry point.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use clap::Parser;
use rookery_journal::{read_record, verify_record, write_record};
use rookery_rules::ChessEngine;
use rookery_server::{
    Coordinator,
    channel::Hub,
    cli::{Cli, Command},
    config::ServerConfig,
    error::Result,
    record_file_name,
    transport::{AppState, router},
};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    setup_logging(&config.log_filter, cli.verbose);

    match &cli.command {
        Some(Command::Verify { path }) => verify(path),
        Some(Command::Serve) | None => serve(config).await,
    }
}

/// `RUST_LOG` wins unless `--verbose` is given; otherwise the configured filter.
fn setup_logging(filter: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn serve(config: ServerConfig) -> Result<()> {
    let engine = match config.start_snapshot() {
        Some(snapshot) => {
            info!(fen = %snapshot, "starting from custom position");
            ChessEngine::from_snapshot(&snapshot)?
        }
        None => ChessEngine::new(),
    };
    let coordinator = Arc::new(Mutex::new(Coordinator::new(engine, Hub::new())));
    let app = router(AppState::new(coordinator.clone()));

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(dir) = &config.journal_dir {
        let record = coordinator.lock().await.record();
        let path = dir.join(record_file_name(SystemTime::now()));
        write_record(&record, &path)?;
        info!(
            path = %path.display(),
            moves = record.moves.len(),
            result = %record.result,
            "game record saved"
        );
    }

    info!("server stopped");
    Ok(())
}

fn verify(path: &Path) -> Result<()> {
    let record = read_record(path)?;
    verify_record::<ChessEngine>(&record)?;
    info!(
        path = %path.display(),
        moves = record.moves.len(),
        result = %record.result,
        "record verified"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
