//! Server configuration.
//!
//! Values come from an optional TOML file and are then overridden by command
//! line flags (see [`crate::cli`]). Every field has a default, so an empty
//! file is valid.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use rookery_rules::Snapshot;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_PORT;
use crate::error::{Result, ServerError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to listen on.
    pub bind_addr: IpAddr,

    pub port: u16,

    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// FEN to start from instead of the standard setup.
    pub start_fen: Option<String>,

    /// Directory the game record is written to on shutdown.
    pub journal_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            log_filter: "info".to_string(),
            start_fen: None,
            journal_dir: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ServerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Custom starting position, if one is configured.
    pub fn start_snapshot(&self) -> Option<Snapshot> {
        self.start_fen.as_deref().map(Snapshot::new)
    }
}
