//! Command line interface.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ServerConfig;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "rookery-server")]
#[command(about = "Two-seat chess session server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Interface to bind
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Write the game record to this directory on shutdown
    #[arg(long)]
    pub journal_dir: Option<PathBuf>,

    /// Start from this FEN instead of the standard setup
    #[arg(long)]
    pub start_fen: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the game over WebSocket (default)
    Serve,

    /// Replay a game record and check it
    Verify {
        /// Record written by the server
        path: PathBuf,
    },
}

impl Cli {
    /// Config file (or defaults) with flags applied on top.
    pub fn resolve_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load_from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(dir) = &self.journal_dir {
            config.journal_dir = Some(dir.clone());
        }
        if let Some(fen) = &self.start_fen {
            config.start_fen = Some(fen.clone());
        }
        if self.verbose {
            config.log_filter = "debug".to_string();
        }
        Ok(config)
    }
}
