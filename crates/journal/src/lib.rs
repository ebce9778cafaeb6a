//! Rookery Game Journal
//!
//! Records every accepted move of a game and turns the log into a
//! [`GameRecordProto`] that can be checked later by replaying it.
//!
//! # Architecture
//!
//! - [`GameJournal`]: append-only log kept by the coordinator
//! - [`verify_record`]: replays a record through a fresh [`RulesEngine`] and
//!   checks every intermediate position plus the final digest
//! - [`write_record`] / [`read_record`]: Protobuf files on disk

#![deny(unsafe_code)]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use rookery_rules::{
    GameResult, MoveOutcome, MoveRequest, RulesEngine, RulesError, Side, Snapshot,
};
use rookery_wire::{GameRecordProto, RECORD_FORMAT_VERSION, RecordedMoveProto};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Result label for a game that has not finished.
pub const ONGOING: &str = "ongoing";

/// Lowercase hex SHA-256 of a snapshot's text.
pub fn snapshot_digest(snapshot: &Snapshot) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snapshot.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Journal
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct JournalEntry {
    side: Side,
    request: MoveRequest,
    after: Snapshot,
}

/// Append-only log of accepted moves.
#[derive(Debug, Clone)]
pub struct GameJournal {
    initial: Snapshot,
    entries: Vec<JournalEntry>,
}

impl GameJournal {
    /// Start a journal for a game beginning at `initial`.
    pub fn new(initial: Snapshot) -> Self {
        Self {
            initial,
            entries: Vec::new(),
        }
    }

    /// Record an accepted move and the position it produced.
    pub fn record(&mut self, side: Side, request: &MoveRequest, after: Snapshot) {
        self.entries.push(JournalEntry {
            side,
            request: *request,
            after,
        });
    }

    /// Number of recorded half-moves.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the record for the game as it stands.
    pub fn finalize(&self, current: &Snapshot, result: Option<GameResult>) -> GameRecordProto {
        let moves = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| RecordedMoveProto {
                ply: index as u32 + 1,
                side: entry.side.code().to_string(),
                from: entry.request.from.to_string(),
                to: entry.request.to.to_string(),
                promotion: entry.request.promotion.map(|p| p.code().to_string()),
                fen_after: entry.after.as_str().to_string(),
            })
            .collect();

        GameRecordProto {
            format_version: RECORD_FORMAT_VERSION,
            initial_fen: self.initial.as_str().to_string(),
            moves,
            final_fen: current.as_str().to_string(),
            final_digest: snapshot_digest(current),
            result: result.map_or(ONGOING, |r| r.as_str()).to_string(),
            winner: result
                .and_then(|r| r.winner())
                .map(|side| side.code().to_string())
                .unwrap_or_default(),
        }
    }
}

// ============================================================================
// Verification
// ============================================================================

/// Why a record failed to replay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("unsupported record format version {found}")]
    UnsupportedVersion { found: u32 },

    #[error("initial position does not load: {0}")]
    InvalidInitialPosition(RulesError),

    #[error("final digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("move {index} carries ply {ply}")]
    PlyMismatch { index: usize, ply: u32 },

    #[error("ply {ply}: unknown side {side:?}")]
    InvalidSide { ply: u32, side: String },

    #[error("ply {ply}: recorded for {recorded} but {expected} was to move")]
    OutOfTurn {
        ply: u32,
        expected: Side,
        recorded: Side,
    },

    #[error("ply {ply}: malformed move: {source}")]
    MalformedMove { ply: u32, source: RulesError },

    #[error("ply {ply}: {mv} is not legal")]
    IllegalMove { ply: u32, mv: String },

    #[error("ply {ply}: position mismatch: expected {expected}, got {actual}")]
    PositionMismatch {
        ply: u32,
        expected: String,
        actual: String,
    },

    #[error("final position mismatch: expected {expected}, got {actual}")]
    FinalPositionMismatch { expected: String, actual: String },

    #[error("result mismatch: expected {expected}, got {actual}")]
    ResultMismatch { expected: String, actual: String },

    #[error("winner mismatch: expected {expected:?}, got {actual:?}")]
    WinnerMismatch { expected: String, actual: String },
}

/// Verify a record by replaying it from its initial position.
///
/// # Verification Steps
/// 1. Format version is supported
/// 2. `final_digest` matches `final_fen`
/// 3. Initial position loads into a fresh engine
/// 4. Each move: ply numbering, side to move, legality, resulting position
/// 5. Replayed position equals `final_fen`
/// 6. Engine's verdict equals the recorded result and winner
pub fn verify_record<E>(record: &GameRecordProto) -> Result<(), VerifyError>
where
    E: RulesEngine + Default,
{
    if record.format_version != RECORD_FORMAT_VERSION {
        return Err(VerifyError::UnsupportedVersion {
            found: record.format_version,
        });
    }

    let actual_digest = snapshot_digest(&record.final_snapshot());
    if actual_digest != record.final_digest {
        return Err(VerifyError::DigestMismatch {
            expected: record.final_digest.clone(),
            actual: actual_digest,
        });
    }

    let mut engine = E::default();
    engine
        .deserialize(&record.initial_snapshot())
        .map_err(VerifyError::InvalidInitialPosition)?;

    for (index, recorded) in record.moves.iter().enumerate() {
        let ply = recorded.ply;
        if ply as usize != index + 1 {
            return Err(VerifyError::PlyMismatch { index, ply });
        }

        let side = recorded.side().ok_or_else(|| VerifyError::InvalidSide {
            ply,
            side: recorded.side.clone(),
        })?;
        let expected = engine.side_to_move();
        if side != expected {
            return Err(VerifyError::OutOfTurn {
                ply,
                expected,
                recorded: side,
            });
        }

        let request = recorded
            .request()
            .map_err(|source| VerifyError::MalformedMove { ply, source })?;
        let snapshot = match engine.apply_move(&request) {
            Ok(MoveOutcome::Accepted { snapshot, .. }) => snapshot,
            Ok(MoveOutcome::Illegal) => {
                return Err(VerifyError::IllegalMove {
                    ply,
                    mv: request.to_string(),
                });
            }
            Err(source) => return Err(VerifyError::MalformedMove { ply, source }),
        };

        if snapshot.as_str() != recorded.fen_after {
            return Err(VerifyError::PositionMismatch {
                ply,
                expected: recorded.fen_after.clone(),
                actual: snapshot.into_string(),
            });
        }
    }

    let replayed = engine.serialize();
    if replayed.as_str() != record.final_fen {
        return Err(VerifyError::FinalPositionMismatch {
            expected: record.final_fen.clone(),
            actual: replayed.into_string(),
        });
    }

    let replayed_result = engine.outcome().map_or(ONGOING, |r| r.as_str());
    if replayed_result != record.result {
        return Err(VerifyError::ResultMismatch {
            expected: record.result.clone(),
            actual: replayed_result.to_string(),
        });
    }

    let replayed_winner = engine
        .outcome()
        .and_then(|r| r.winner())
        .map(|side| side.code().to_string())
        .unwrap_or_default();
    if replayed_winner != record.winner {
        return Err(VerifyError::WinnerMismatch {
            expected: record.winner.clone(),
            actual: replayed_winner,
        });
    }

    Ok(())
}

// ============================================================================
// Record I/O
// ============================================================================

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("game record already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to decode game record: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Write a record to `path`, creating parent directories.
///
/// Never overwrites an existing file.
pub fn write_record(record: &GameRecordProto, path: &Path) -> Result<(), JournalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(JournalError::AlreadyExists(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(&record.encode_to_vec())?;

    tracing::debug!(path = %path.display(), moves = record.moves.len(), "game record written");
    Ok(())
}

/// Read a record written by [`write_record`].
pub fn read_record(path: &Path) -> Result<GameRecordProto, JournalError> {
    let data = fs::read(path)?;
    Ok(GameRecordProto::decode(data.as_slice())?)
}

// ============================================================================
// Tests
// ============================================================================
