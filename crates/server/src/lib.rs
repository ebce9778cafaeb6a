//! Rookery Session Server
//!
//! Coordinates one shared chess game between any number of connections. The
//! first two connections play white and black; everyone else watches.
//!
//! It owns:
//! - Seat assignment ([`registry`])
//! - Pre-engine submission checks ([`validation`])
//! - Outbound delivery ([`channel`])
//! - The move coordinator ([`Coordinator`]), which sequences authorization,
//!   legality, mutation, journaling and broadcast for every move
//! - The socket transport ([`transport`]) and process configuration
//!
//! # Architecture
//!
//! The coordinator never looks inside a position. Turn order and legality
//! come from the [`RulesEngine`]; the coordinator only compares the engine's
//! side-to-move with the submitter's seat and routes the result.

#![deny(unsafe_code)]

pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod registry;
pub mod transport;
pub mod validation;

use std::time::{SystemTime, UNIX_EPOCH};

use channel::Broadcaster;
use registry::{ConnectionId, Role, SeatRegistry};
use rookery_journal::GameJournal;
use rookery_rules::{GameResult, MoveOutcome, RulesEngine, Side, Snapshot};
use rookery_wire::{
    ClientMessage, GameRecordProto, MovePayload, ServerMessage, decode_client,
};
use validation::{SubmitOutcome, validate_submission};

// ============================================================================
// Parameters
// ============================================================================

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;

/// Text sent with every `requestError`.
pub const REQUEST_ERROR_MESSAGE: &str = "Invalid move format or internal error.";

/// File name for a game record written at `at`.
pub fn record_file_name(at: SystemTime) -> String {
    let secs = at
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    format!("game-{secs}.pb")
}

// ============================================================================
// Coordinator
// ============================================================================

/// The single writer for game state.
///
/// Every call runs to completion before the next one starts; callers
/// serialize access (the transport keeps it behind one mutex).
pub struct Coordinator<E, B> {
    engine: E,
    seats: SeatRegistry,
    journal: GameJournal,
    channel: B,
}

impl<E, B> Coordinator<E, B>
where
    E: RulesEngine,
    B: Broadcaster,
{
    /// Start coordinating the game held by `engine`.
    pub fn new(engine: E, channel: B) -> Self {
        let journal = GameJournal::new(engine.serialize());
        Self {
            engine,
            seats: SeatRegistry::new(),
            journal,
            channel,
        }
    }

    /// Seat a new connection and tell it its role.
    pub fn connect(&mut self, connection: ConnectionId) -> Role {
        let role = self.seats.assign(connection);
        let message = match role {
            Role::Player(side) => {
                tracing::info!(connection, %side, "player seated");
                ServerMessage::RoleAssigned(side)
            }
            Role::Observer => {
                tracing::info!(connection, "observer joined");
                ServerMessage::SpectatorAssigned
            }
        };
        self.channel.send_to(connection, message);
        role
    }

    /// Release the connection's seat and announce it to everyone left.
    ///
    /// Observers and repeated calls are no-ops.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Option<Side> {
        let Some(side) = self.seats.release(connection) else {
            tracing::debug!(connection, "observer left");
            return None;
        };
        tracing::info!(connection, %side, "seat released");
        self.channel.broadcast_all(ServerMessage::PlayerLeft(side));
        Some(side)
    }

    /// Handle one text frame from a connection.
    ///
    /// Returns `None` when the frame was not a recognizable message.
    pub fn handle_frame(
        &mut self,
        connection: ConnectionId,
        frame: &str,
    ) -> Option<SubmitOutcome> {
        match decode_client(frame) {
            Ok(ClientMessage::SubmitMove(payload)) => {
                Some(self.submit_move(connection, &payload))
            }
            Err(e) => {
                tracing::debug!(connection, error = %e, "undecodable frame");
                self.reject_frame(connection);
                None
            }
        }
    }

    /// Answer a frame that could not be interpreted.
    pub fn reject_frame(&mut self, connection: ConnectionId) {
        self.channel.send_to(
            connection,
            ServerMessage::RequestError(REQUEST_ERROR_MESSAGE.to_string()),
        );
    }

    /// Process a move attempt.
    ///
    /// # Order
    /// 1. Authorization against the engine's side to move (silent drop)
    /// 2. Game-over check
    /// 3. Payload validation
    /// 4. Legality, via the engine
    /// 5. Journal, then broadcast move, snapshot and any game over
    pub fn submit_move(
        &mut self,
        connection: ConnectionId,
        payload: &MovePayload,
    ) -> SubmitOutcome {
        let side_to_move = self.engine.side_to_move();
        let seat = self.seats.side_of(connection);
        let game_over = self.engine.outcome().is_some();

        let request = match validate_submission(seat, side_to_move, game_over, payload) {
            Ok(request) => request,
            Err(outcome) => {
                self.notify_failure(connection, payload, outcome);
                return outcome;
            }
        };

        let (applied, snapshot) = match self.engine.apply_move(&request) {
            Ok(MoveOutcome::Accepted { applied, snapshot }) => (applied, snapshot),
            Ok(MoveOutcome::Illegal) => {
                self.notify_failure(connection, payload, SubmitOutcome::Rejected);
                return SubmitOutcome::Rejected;
            }
            Err(e) => {
                tracing::warn!(connection, mv = %request, error = %e, "engine failed on move");
                self.notify_failure(connection, payload, SubmitOutcome::Malformed);
                return SubmitOutcome::Malformed;
            }
        };

        tracing::info!(connection, side = %side_to_move, mv = %applied, "move accepted");
        self.journal.record(side_to_move, &applied, snapshot.clone());
        self.channel.broadcast_all(ServerMessage::MoveAccepted(MovePayload::from(&applied)));
        self.channel.broadcast_all(ServerMessage::PositionSnapshot(snapshot));

        if let Some(result) = self.engine.outcome() {
            tracing::info!(result = result.as_str(), "game over");
            self.channel.broadcast_all(ServerMessage::GameOver(result.into()));
        }

        SubmitOutcome::Accepted
    }

    fn notify_failure(
        &mut self,
        connection: ConnectionId,
        payload: &MovePayload,
        outcome: SubmitOutcome,
    ) {
        match outcome {
            SubmitOutcome::DroppedObserver | SubmitOutcome::DroppedOutOfTurn => {
                tracing::debug!(connection, ?outcome, "submission dropped");
            }
            SubmitOutcome::Rejected | SubmitOutcome::RejectedGameOver => {
                tracing::debug!(
                    connection,
                    ?outcome,
                    from = %payload.from,
                    to = %payload.to,
                    "move rejected"
                );
                self.channel.send_to(connection, ServerMessage::MoveRejected(payload.clone()));
            }
            SubmitOutcome::Malformed => {
                tracing::debug!(connection, "malformed move");
                self.channel.send_to(
                    connection,
                    ServerMessage::RequestError(REQUEST_ERROR_MESSAGE.to_string()),
                );
            }
            SubmitOutcome::Accepted => {}
        }
    }

    /// Whose turn it is.
    pub fn side_to_move(&self) -> Side {
        self.engine.side_to_move()
    }

    /// Current position.
    pub fn snapshot(&self) -> Snapshot {
        self.engine.serialize()
    }

    pub fn outcome(&self) -> Option<GameResult> {
        self.engine.outcome()
    }

    pub fn seats(&self) -> &SeatRegistry {
        &self.seats
    }

    pub fn journal(&self) -> &GameJournal {
        &self.journal
    }

    pub fn channel(&self) -> &B {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut B {
        &mut self.channel
    }

    /// Game record for everything played so far.
    pub fn record(&self) -> GameRecordProto {
        self.journal.finalize(&self.snapshot(), self.outcome())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use rookery_journal::verify_record;
    use rookery_rules::{ChessEngine, MoveRequest, RulesError};
    use rookery_wire::GameOverPayload;

    use super::*;

    /// Keeps every message per connection instead of sending it.
    #[derive(Debug, Default)]
    struct RecordingChannel {
        inboxes: BTreeMap<ConnectionId, Vec<ServerMessage>>,
        next_connection_id: ConnectionId,
    }

    impl RecordingChannel {
        fn open(&mut self) -> ConnectionId {
            self.next_connection_id += 1;
            self.inboxes.insert(self.next_connection_id, Vec::new());
            self.next_connection_id
        }

        fn close(&mut self, connection: ConnectionId) {
            self.inboxes.remove(&connection);
        }

        fn take(&mut self, connection: ConnectionId) -> Vec<ServerMessage> {
            self.inboxes
                .get_mut(&connection)
                .map(std::mem::take)
                .unwrap_or_default()
        }
    }

    impl Broadcaster for RecordingChannel {
        fn send_to(&mut self, connection: ConnectionId, message: ServerMessage) {
            if let Some(inbox) = self.inboxes.get_mut(&connection) {
                inbox.push(message);
            }
        }

        fn broadcast_all(&mut self, message: ServerMessage) {
            for inbox in self.inboxes.values_mut() {
                inbox.push(message.clone());
            }
        }
    }

    /// Engine whose every move attempt fails.
    #[derive(Debug, Default)]
    struct BrokenEngine;

    impl RulesEngine for BrokenEngine {
        fn side_to_move(&self) -> Side {
            Side::White
        }

        fn apply_move(&mut self, _request: &MoveRequest) -> Result<MoveOutcome, RulesError> {
            Err(RulesError::InvalidSnapshot("corrupt position".to_string()))
        }

        fn serialize(&self) -> Snapshot {
            Snapshot::new("broken")
        }

        fn deserialize(&mut self, _snapshot: &Snapshot) -> Result<(), RulesError> {
            Ok(())
        }

        fn outcome(&self) -> Option<GameResult> {
            None
        }
    }

    type Game = Coordinator<ChessEngine, RecordingChannel>;

    fn new_game() -> Game {
        Coordinator::new(ChessEngine::new(), RecordingChannel::default())
    }

    fn join<E: RulesEngine>(game: &mut Coordinator<E, RecordingChannel>) -> ConnectionId {
        let connection = game.channel_mut().open();
        game.connect(connection);
        connection
    }

    fn leave(game: &mut Game, connection: ConnectionId) -> Option<Side> {
        game.channel_mut().close(connection);
        game.disconnect(connection)
    }

    fn inbox<E: RulesEngine>(
        game: &mut Coordinator<E, RecordingChannel>,
        connection: ConnectionId,
    ) -> Vec<ServerMessage> {
        game.channel_mut().take(connection)
    }

    fn mv(from: &str, to: &str) -> MovePayload {
        MovePayload {
            from: from.to_string(),
            to: to.to_string(),
            promotion: None,
        }
    }

    /// White, black and one observer, with role messages already drained.
    fn seated_game() -> (Game, ConnectionId, ConnectionId, ConnectionId) {
        let mut game = new_game();
        let white = join(&mut game);
        let black = join(&mut game);
        let observer = join(&mut game);
        for connection in [white, black, observer] {
            inbox(&mut game, connection);
        }
        (game, white, black, observer)
    }

    #[test]
    fn test_role_notifications() {
        let mut game = new_game();
        let a = join(&mut game);
        let b = join(&mut game);
        let c = join(&mut game);

        assert_eq!(inbox(&mut game, a), vec![ServerMessage::RoleAssigned(Side::White)]);
        assert_eq!(inbox(&mut game, b), vec![ServerMessage::RoleAssigned(Side::Black)]);
        assert_eq!(inbox(&mut game, c), vec![ServerMessage::SpectatorAssigned]);
        assert!(game.seats().is_full());
    }

    #[test]
    fn test_accepted_move_is_broadcast() {
        let (mut game, white, black, observer) = seated_game();

        let outcome = game.submit_move(white, &mv("e2", "e4"));
        assert!(outcome.is_accepted());
        assert_eq!(game.side_to_move(), Side::Black);

        let snapshot = game.snapshot();
        assert!(snapshot.as_str().contains(" b "));
        for connection in [white, black, observer] {
            assert_eq!(
                inbox(&mut game, connection),
                vec![
                    ServerMessage::MoveAccepted(mv("e2", "e4")),
                    ServerMessage::PositionSnapshot(snapshot.clone()),
                ]
            );
        }
        assert_eq!(game.journal().len(), 1);
    }

    #[test]
    fn test_out_of_turn_submission_is_silent() {
        let (mut game, white, black, observer) = seated_game();
        let before = game.snapshot();

        assert_eq!(
            game.submit_move(black, &mv("e7", "e5")),
            SubmitOutcome::DroppedOutOfTurn
        );
        assert_eq!(game.snapshot(), before);
        for connection in [white, black, observer] {
            assert!(inbox(&mut game, connection).is_empty());
        }
    }

    #[test]
    fn test_observer_submission_is_silent() {
        let (mut game, white, black, observer) = seated_game();
        let before = game.snapshot();

        assert_eq!(
            game.submit_move(observer, &mv("e2", "e4")),
            SubmitOutcome::DroppedObserver
        );
        assert_eq!(game.snapshot(), before);
        for connection in [white, black, observer] {
            assert!(inbox(&mut game, connection).is_empty());
        }
        assert!(game.journal().is_empty());
    }

    #[test]
    fn test_illegal_move_rejected_to_submitter_only() {
        let (mut game, white, black, observer) = seated_game();
        let before = game.snapshot();

        assert_eq!(game.submit_move(white, &mv("a2", "a5")), SubmitOutcome::Rejected);
        assert_eq!(game.snapshot(), before);
        assert_eq!(game.side_to_move(), Side::White);
        assert_eq!(
            inbox(&mut game, white),
            vec![ServerMessage::MoveRejected(mv("a2", "a5"))]
        );
        assert!(inbox(&mut game, black).is_empty());
        assert!(inbox(&mut game, observer).is_empty());
    }

    #[test]
    fn test_malformed_move_gets_request_error() {
        let (mut game, white, black, _) = seated_game();

        assert_eq!(game.submit_move(white, &mv("e2", "e9")), SubmitOutcome::Malformed);
        assert_eq!(
            inbox(&mut game, white),
            vec![ServerMessage::RequestError(REQUEST_ERROR_MESSAGE.to_string())]
        );
        assert!(inbox(&mut game, black).is_empty());
        assert_eq!(game.side_to_move(), Side::White);
    }

    #[test]
    fn test_handle_frame() {
        let (mut game, white, black, _) = seated_game();

        assert_eq!(game.handle_frame(white, "{not json"), None);
        assert_eq!(
            inbox(&mut game, white),
            vec![ServerMessage::RequestError(REQUEST_ERROR_MESSAGE.to_string())]
        );

        let frame = r#"{"type":"submitMove","payload":{"from":"g1","to":"f3","promotion":"q"}}"#;
        assert_eq!(game.handle_frame(white, frame), Some(SubmitOutcome::Accepted));
        let messages = inbox(&mut game, black);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ServerMessage::MoveAccepted(mv("g1", "f3")));
    }

    #[test]
    fn test_echo_drops_promotion_on_plain_move() {
        let (mut game, white, black, _) = seated_game();
        let knight = MovePayload {
            promotion: Some("q".to_string()),
            ..mv("g1", "f3")
        };

        assert!(game.submit_move(white, &knight).is_accepted());
        assert_eq!(
            inbox(&mut game, black)[0],
            ServerMessage::MoveAccepted(mv("g1", "f3"))
        );
        assert_eq!(game.record().moves[0].promotion, None);
    }

    #[test]
    fn test_echo_names_default_promotion() {
        let start = Snapshot::new("8/P7/8/8/8/8/8/4K2k w - - 0 1");
        let engine = ChessEngine::from_snapshot(&start).unwrap();
        let mut game = Coordinator::new(engine, RecordingChannel::default());
        let white = join(&mut game);
        inbox(&mut game, white);

        assert!(game.submit_move(white, &mv("a7", "a8")).is_accepted());
        let queen = MovePayload {
            promotion: Some("q".to_string()),
            ..mv("a7", "a8")
        };
        assert_eq!(inbox(&mut game, white)[0], ServerMessage::MoveAccepted(queen));

        let record = game.record();
        assert_eq!(record.moves[0].promotion.as_deref(), Some("q"));
        assert!(verify_record::<ChessEngine>(&record).is_ok());
    }

    #[test]
    fn test_disconnect_frees_seat() {
        let (mut game, white, black, observer) = seated_game();

        assert_eq!(leave(&mut game, white), Some(Side::White));
        assert_eq!(inbox(&mut game, black), vec![ServerMessage::PlayerLeft(Side::White)]);
        assert_eq!(inbox(&mut game, observer), vec![ServerMessage::PlayerLeft(Side::White)]);

        // The existing observer stays an observer; the next arrival is white.
        let newcomer = join(&mut game);
        assert_eq!(
            inbox(&mut game, newcomer),
            vec![ServerMessage::RoleAssigned(Side::White)]
        );
        assert_eq!(game.seats().side_of(observer), None);
        assert!(game.submit_move(newcomer, &mv("d2", "d4")).is_accepted());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (mut game, white, black, observer) = seated_game();

        assert_eq!(leave(&mut game, black), Some(Side::Black));
        assert_eq!(game.disconnect(black), None);
        assert_eq!(leave(&mut game, observer), None);

        assert_eq!(inbox(&mut game, white), vec![ServerMessage::PlayerLeft(Side::Black)]);
        assert_eq!(game.seats().occupant(Side::White), Some(white));
    }

    #[test]
    fn test_game_state_survives_seat_churn() {
        let (mut game, white, black, _) = seated_game();
        assert!(game.submit_move(white, &mv("e2", "e4")).is_accepted());
        leave(&mut game, black);

        let replacement = join(&mut game);
        inbox(&mut game, replacement);
        assert_eq!(game.side_to_move(), Side::Black);
        assert!(game.submit_move(replacement, &mv("c7", "c5")).is_accepted());
    }

    #[test]
    fn test_three_connection_session() {
        let (mut game, a, b, c) = seated_game();

        assert!(game.submit_move(a, &mv("e2", "e4")).is_accepted());
        for connection in [a, b, c] {
            assert_eq!(inbox(&mut game, connection).len(), 2);
        }

        assert!(game.submit_move(b, &mv("e7", "e5")).is_accepted());
        for connection in [a, b, c] {
            let messages = inbox(&mut game, connection);
            assert_eq!(messages[0], ServerMessage::MoveAccepted(mv("e7", "e5")));
        }

        // A king cannot jump two squares forward.
        let before = game.snapshot();
        assert_eq!(game.submit_move(a, &mv("e1", "e3")), SubmitOutcome::Rejected);
        assert_eq!(
            inbox(&mut game, a),
            vec![ServerMessage::MoveRejected(mv("e1", "e3"))]
        );
        assert!(inbox(&mut game, b).is_empty());
        assert!(inbox(&mut game, c).is_empty());
        assert_eq!(game.snapshot(), before);
        assert_eq!(game.side_to_move(), Side::White);
    }

    #[test]
    fn test_checkmate_ends_game() {
        let (mut game, white, black, observer) = seated_game();
        for (connection, from, to) in [
            (white, "f2", "f3"),
            (black, "e7", "e5"),
            (white, "g2", "g4"),
        ] {
            assert!(game.submit_move(connection, &mv(from, to)).is_accepted());
        }
        for connection in [white, black, observer] {
            inbox(&mut game, connection);
        }

        assert!(game.submit_move(black, &mv("d8", "h4")).is_accepted());
        let messages = inbox(&mut game, observer);
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[2],
            ServerMessage::GameOver(GameOverPayload {
                result: "checkmate".to_string(),
                winner: Some(Side::Black),
            })
        );

        // White is on move but the game is finished.
        assert_eq!(
            game.submit_move(white, &mv("a2", "a3")),
            SubmitOutcome::RejectedGameOver
        );
        assert_eq!(
            inbox(&mut game, white),
            vec![
                messages[0].clone(),
                messages[1].clone(),
                messages[2].clone(),
                ServerMessage::MoveRejected(mv("a2", "a3")),
            ]
        );
        assert_eq!(inbox(&mut game, black).len(), 3);
    }

    #[test]
    fn test_engine_failure_reported_as_request_error() {
        let mut game = Coordinator::new(BrokenEngine, RecordingChannel::default());
        let white = join(&mut game);
        inbox(&mut game, white);

        assert_eq!(game.submit_move(white, &mv("e2", "e4")), SubmitOutcome::Malformed);
        assert_eq!(
            inbox(&mut game, white),
            vec![ServerMessage::RequestError(REQUEST_ERROR_MESSAGE.to_string())]
        );
        assert!(game.journal().is_empty());
    }

    #[test]
    fn test_record_verifies() {
        let (mut game, white, black, _) = seated_game();
        for (connection, from, to) in [
            (white, "e2", "e4"),
            (black, "c7", "c5"),
            (white, "g1", "f3"),
        ] {
            assert!(game.submit_move(connection, &mv(from, to)).is_accepted());
        }
        // Rejected and dropped moves leave no trace.
        assert_eq!(game.submit_move(black, &mv("d8", "d1")), SubmitOutcome::Rejected);
        assert_eq!(
            game.submit_move(white, &mv("d2", "d4")),
            SubmitOutcome::DroppedOutOfTurn
        );

        let record = game.record();
        assert_eq!(record.moves.len(), 3);
        assert_eq!(record.final_fen, game.snapshot().as_str());
        assert!(verify_record::<ChessEngine>(&record).is_ok());
    }

    #[test]
    fn test_record_file_name() {
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(record_file_name(at), "game-1700000000.pb");
    }
}
