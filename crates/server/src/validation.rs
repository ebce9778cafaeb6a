//! Move submission checks that run before the rules engine sees a move.
//!
//! Order matters:
//! - Sender does not hold the side to move: DROP (silent)
//! - Game already finished: REJECT
//! - Payload is not a well-formed move: MALFORMED

use rookery_rules::{MoveRequest, Side};
use rookery_wire::MovePayload;

/// What happened to one submitted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Applied and broadcast.
    Accepted,
    /// Illegal in the current position.
    Rejected,
    /// The game is over.
    RejectedGameOver,
    /// Payload could not be turned into a move, or the engine failed.
    Malformed,
    /// Dropped: sender is an observer.
    DroppedObserver,
    /// Dropped: sender plays the side not on move.
    DroppedOutOfTurn,
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Dropped outcomes produce no message at all.
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::DroppedObserver | Self::DroppedOutOfTurn)
    }
}

/// Run the pre-engine checks for a move from a connection seated at `seat`.
pub fn validate_submission(
    seat: Option<Side>,
    side_to_move: Side,
    game_over: bool,
    payload: &MovePayload,
) -> Result<MoveRequest, SubmitOutcome> {
    match seat {
        None => return Err(SubmitOutcome::DroppedObserver),
        Some(side) if side != side_to_move => return Err(SubmitOutcome::DroppedOutOfTurn),
        Some(_) => {}
    }

    if game_over {
        return Err(SubmitOutcome::RejectedGameOver);
    }

    payload.to_request().map_err(|_| SubmitOutcome::Malformed)
}
