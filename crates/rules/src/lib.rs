//! Rookery Rules
//!
//! This crate defines the seam between the session server and whatever decides
//! chess legality. The server only ever talks to a [`RulesEngine`]; it never
//! inspects or mutates a position itself.
//!
//! # Contents
//!
//! - [`Side`], [`Square`], [`Promotion`], [`MoveRequest`]: fixed-shape move
//!   vocabulary, validated when built from untrusted text.
//! - [`Snapshot`]: the engine's canonical board serialization (FEN), opaque to
//!   callers.
//! - [`RulesEngine`]: side-to-move, move application, (de)serialization and
//!   game-over detection.
//! - [`ChessEngine`]: the standard-chess implementation backed by `shakmaty`.

#![deny(unsafe_code)]

mod chess;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chess::ChessEngine;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while building moves or loading positions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    /// Not a square in algebraic notation (`a1`..`h8`).
    #[error("invalid square: {0:?}")]
    InvalidSquare(String),

    /// Not one of `q`, `r`, `b`, `n`.
    #[error("invalid promotion piece: {0:?}")]
    InvalidPromotion(String),

    /// Snapshot could not be parsed or describes an impossible position.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

// ============================================================================
// Side
// ============================================================================

/// One of the two playing roles. White moves first.
///
/// On the wire a side is its single-letter code (`"w"` / `"b"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Side {
    /// Both sides in seating order.
    pub const ALL: [Side; 2] = [Side::White, Side::Black];

    /// The other side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Single-letter code used in FEN and on the wire.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::White => 'w',
            Self::Black => 'b',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

// ============================================================================
// Move Vocabulary
// ============================================================================

/// A board square, file `a`-`h` and rank `1`-`8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// Zero-based file index (`a` = 0).
    pub fn file(self) -> u8 {
        self.file
    }

    /// Zero-based rank index (`1` = 0).
    pub fn rank(self) -> u8 {
        self.rank
    }
}

impl FromStr for Square {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RulesError::InvalidSquare(s.to_string());
        let &[file, rank] = s.as_bytes() else {
            return Err(invalid());
        };
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(invalid());
        }
        Ok(Self {
            file: file - b'a',
            rank: rank - b'1',
        })
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", char::from(b'a' + self.file), self.rank + 1)
    }
}

/// Piece a pawn turns into on the last rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Promotion {
    #[default]
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl Promotion {
    /// Lowercase piece letter.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Queen => 'q',
            Self::Rook => 'r',
            Self::Bishop => 'b',
            Self::Knight => 'n',
        }
    }
}

impl FromStr for Promotion {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "q" => Ok(Self::Queen),
            "r" => Ok(Self::Rook),
            "b" => Ok(Self::Bishop),
            "n" => Ok(Self::Knight),
            other => Err(RulesError::InvalidPromotion(other.to_string())),
        }
    }
}

/// A move attempt: origin, destination and optional promotion piece.
///
/// A missing promotion means queen when the move promotes and is ignored
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveRequest {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Promotion>,
}

impl MoveRequest {
    /// Build a move from its textual parts.
    pub fn parse(from: &str, to: &str, promotion: Option<&str>) -> Result<Self, RulesError> {
        Ok(Self {
            from: from.parse()?,
            to: to.parse()?,
            promotion: promotion.map(str::parse).transpose()?,
        })
    }
}

impl fmt::Display for MoveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion.code())?;
        }
        Ok(())
    }
}

// ============================================================================
// Snapshot & Results
// ============================================================================

/// Canonical serialization of a position, side-to-move included (FEN).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn new(serialized: impl Into<String>) -> Self {
        Self(serialized.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a finished game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Checkmate { winner: Side },
    Stalemate,
    InsufficientMaterial,
}

impl GameResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checkmate { .. } => "checkmate",
            Self::Stalemate => "stalemate",
            Self::InsufficientMaterial => "insufficient-material",
        }
    }

    /// Winning side, `None` for draws.
    pub fn winner(&self) -> Option<Side> {
        match self {
            Self::Checkmate { winner } => Some(*winner),
            Self::Stalemate | Self::InsufficientMaterial => None,
        }
    }
}

/// Result of offering a move to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Move applied. `applied` is the move as played: the promotion piece is
    /// set exactly when the move promotes, queen when none was asked for.
    Accepted {
        applied: MoveRequest,
        snapshot: Snapshot,
    },
    /// Move not legal here; position unchanged.
    Illegal,
}

impl MoveOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

// ============================================================================
// Rules Engine Contract
// ============================================================================

/// Owner of the game state and of everything chess-specific about it.
///
/// Implementations keep the position and side-to-move; callers only move the
/// game forward through [`RulesEngine::apply_move`].
pub trait RulesEngine {
    /// Whose turn it is.
    fn side_to_move(&self) -> Side;

    /// Validate and, when legal, apply a move.
    ///
    /// `Ok(MoveOutcome::Illegal)` leaves the position untouched. `Err` is
    /// reserved for requests the engine cannot interpret at all.
    fn apply_move(&mut self, request: &MoveRequest) -> Result<MoveOutcome, RulesError>;

    /// Serialize the current position.
    fn serialize(&self) -> Snapshot;

    /// Replace the current position with a serialized one.
    fn deserialize(&mut self, snapshot: &Snapshot) -> Result<(), RulesError>;

    /// `Some` once the game is over.
    fn outcome(&self) -> Option<GameResult>;
}

// ============================================================================
// Tests
// ============================================================================
