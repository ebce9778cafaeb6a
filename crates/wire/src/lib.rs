//! Rookery Wire Protocol Types
//!
//! Shared message types for everything that crosses a process boundary:
//!
//! - **Socket frames** (JSON text): [`ClientMessage`] and [`ServerMessage`],
//!   adjacently tagged as `{"type": ..., "payload": ...}`.
//! - **Game records** (Protobuf via prost): [`GameRecordProto`], the artifact
//!   the journal writes to disk.
//!
//! Payloads are fixed-shape records. Turning a [`MovePayload`] into a
//! [`MoveRequest`] is the boundary where square and promotion text is
//! validated.

#![deny(unsafe_code)]

use prost::Message;
use rookery_rules::{GameResult, MoveRequest, RulesError, Side, Snapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current game record schema version.
pub const RECORD_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum WireError {
    /// Incoming frame is not a known client message.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Outgoing message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

// ============================================================================
// Socket Payloads
// ============================================================================

/// Move as it travels on the wire: two square names and an optional
/// promotion letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovePayload {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl MovePayload {
    /// Validate into a typed move.
    pub fn to_request(&self) -> Result<MoveRequest, RulesError> {
        MoveRequest::parse(&self.from, &self.to, self.promotion.as_deref())
    }
}

impl From<&MoveRequest> for MovePayload {
    fn from(request: &MoveRequest) -> Self {
        Self {
            from: request.from.to_string(),
            to: request.to.to_string(),
            promotion: request.promotion.map(|p| p.code().to_string()),
        }
    }
}

/// End-of-game announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverPayload {
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Side>,
}

impl From<GameResult> for GameOverPayload {
    fn from(result: GameResult) -> Self {
        Self {
            result: result.as_str().to_string(),
            winner: result.winner(),
        }
    }
}

// ============================================================================
// Socket Messages
// ============================================================================

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Move attempt.
    SubmitMove(MovePayload),
}

/// Server → client, either one-to-one or broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    /// You play this side. One-to-one.
    RoleAssigned(Side),
    /// You are an observer. One-to-one.
    SpectatorAssigned,
    /// Echo of an applied move. Broadcast.
    MoveAccepted(MovePayload),
    /// Authoritative position after a move. Broadcast.
    PositionSnapshot(Snapshot),
    /// The move was refused; position unchanged. One-to-one.
    MoveRejected(MovePayload),
    /// The request could not be interpreted. One-to-one.
    RequestError(String),
    /// A seat was freed. Broadcast.
    PlayerLeft(Side),
    /// The last accepted move ended the game. Broadcast.
    GameOver(GameOverPayload),
}

impl ServerMessage {
    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoleAssigned(_) => "roleAssigned",
            Self::SpectatorAssigned => "spectatorAssigned",
            Self::MoveAccepted(_) => "moveAccepted",
            Self::PositionSnapshot(_) => "positionSnapshot",
            Self::MoveRejected(_) => "moveRejected",
            Self::RequestError(_) => "requestError",
            Self::PlayerLeft(_) => "playerLeft",
            Self::GameOver(_) => "gameOver",
        }
    }
}

/// Parse one incoming text frame.
pub fn decode_client(frame: &str) -> Result<ClientMessage, WireError> {
    serde_json::from_str(frame).map_err(WireError::Malformed)
}

/// Render one outgoing text frame.
pub fn encode_server(message: &ServerMessage) -> Result<String, WireError> {
    serde_json::to_string(message).map_err(WireError::Encode)
}

// ============================================================================
// Game Record (Protobuf)
// ============================================================================

/// One accepted move, with the position it produced.
#[derive(Clone, PartialEq, Message)]
pub struct RecordedMoveProto {
    /// Half-move index, starting at 1.
    #[prost(uint32, tag = "1")]
    pub ply: u32,

    /// Side that moved (`"w"` / `"b"`).
    #[prost(string, tag = "2")]
    pub side: String,

    #[prost(string, tag = "3")]
    pub from: String,

    #[prost(string, tag = "4")]
    pub to: String,

    #[prost(string, optional, tag = "5")]
    pub promotion: Option<String>,

    /// Snapshot after the move.
    #[prost(string, tag = "6")]
    pub fen_after: String,
}

impl RecordedMoveProto {
    /// Side that made this move, if the field holds a valid code.
    pub fn side(&self) -> Option<Side> {
        match self.side.as_str() {
            "w" => Some(Side::White),
            "b" => Some(Side::Black),
            _ => None,
        }
    }

    pub fn request(&self) -> Result<MoveRequest, RulesError> {
        MoveRequest::parse(&self.from, &self.to, self.promotion.as_deref())
    }
}

/// Complete record of one game.
#[derive(Clone, PartialEq, Message)]
pub struct GameRecordProto {
    /// Schema version (starts at 1).
    #[prost(uint32, tag = "1")]
    pub format_version: u32,

    /// Position the game started from.
    #[prost(string, tag = "2")]
    pub initial_fen: String,

    /// Accepted moves in application order.
    #[prost(message, repeated, tag = "3")]
    pub moves: Vec<RecordedMoveProto>,

    /// Position when the record was finalized.
    #[prost(string, tag = "4")]
    pub final_fen: String,

    /// Lowercase hex SHA-256 of `final_fen`.
    #[prost(string, tag = "5")]
    pub final_digest: String,

    /// `"ongoing"` or a finished-game result.
    #[prost(string, tag = "6")]
    pub result: String,

    /// Winning side code, empty for draws and unfinished games.
    #[prost(string, tag = "7")]
    pub winner: String,
}

impl GameRecordProto {
    pub fn initial_snapshot(&self) -> Snapshot {
        Snapshot::new(self.initial_fen.clone())
    }

    pub fn final_snapshot(&self) -> Snapshot {
        Snapshot::new(self.final_fen.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
