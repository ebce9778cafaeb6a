//! Errors that stop the server process.
//!
//! Nothing raised while a game is running ends up here; per-move failures
//! are answered on the socket instead.

use std::io;
use std::path::PathBuf;

use rookery_journal::{JournalError, VerifyError};
use rookery_rules::RulesError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("invalid start position: {0}")]
    StartPosition(#[from] RulesError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("game record failed verification: {0}")]
    Verify(#[from] VerifyError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for server startup and shutdown.
pub type Result<T> = std::result::Result<T, ServerError>;
