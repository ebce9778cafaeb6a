//! Standard chess rules via shakmaty.

use shakmaty::{
    CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role, fen::Fen, uci::UciMove,
};

use crate::{
    GameResult, MoveOutcome, MoveRequest, Promotion, RulesEngine, RulesError, Side, Snapshot,
    Square,
};

/// Chess position from the standard starting setup, or from a loaded FEN.
#[derive(Debug, Clone, Default)]
pub struct ChessEngine {
    position: Chess,
}

impl ChessEngine {
    /// Engine at the standard starting position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine at the position described by `snapshot`.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, RulesError> {
        let mut engine = Self::new();
        engine.deserialize(snapshot)?;
        Ok(engine)
    }

    /// Find the legal move matching `request`.
    ///
    /// Castling is matched by the king's two-square step (`e1g1`), and a
    /// promotion piece only matters when the move actually promotes.
    fn find_legal(&self, request: &MoveRequest) -> Result<Option<Move>, RulesError> {
        let from = to_shakmaty(request.from)?;
        let to = to_shakmaty(request.to)?;
        let wanted = to_role(request.promotion.unwrap_or_default());

        let found = self.position.legal_moves().into_iter().find(|m| {
            match UciMove::from_move(*m, CastlingMode::Standard) {
                UciMove::Normal {
                    from: f,
                    to: t,
                    promotion,
                } => f == from && t == to && promotion.is_none_or(|role| role == wanted),
                _ => false,
            }
        });
        Ok(found)
    }
}

impl RulesEngine for ChessEngine {
    fn side_to_move(&self) -> Side {
        match self.position.turn() {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }

    fn apply_move(&mut self, request: &MoveRequest) -> Result<MoveOutcome, RulesError> {
        let Some(m) = self.find_legal(request)? else {
            return Ok(MoveOutcome::Illegal);
        };
        let applied = MoveRequest {
            from: request.from,
            to: request.to,
            promotion: m.promotion().and_then(from_role),
        };
        self.position.play_unchecked(m);
        Ok(MoveOutcome::Accepted {
            applied,
            snapshot: self.serialize(),
        })
    }

    fn serialize(&self) -> Snapshot {
        Snapshot::new(Fen::from_position(&self.position, EnPassantMode::Legal).to_string())
    }

    fn deserialize(&mut self, snapshot: &Snapshot) -> Result<(), RulesError> {
        let fen: Fen = snapshot
            .as_str()
            .parse()
            .map_err(|e| RulesError::InvalidSnapshot(format!("{e}")))?;
        let position: Chess = fen
            .into_position(CastlingMode::Standard)
            .map_err(|e| RulesError::InvalidSnapshot(format!("{e}")))?;
        self.position = position;
        Ok(())
    }

    fn outcome(&self) -> Option<GameResult> {
        if self.position.is_checkmate() {
            // The side to move is mated.
            Some(GameResult::Checkmate {
                winner: self.side_to_move().opponent(),
            })
        } else if self.position.is_stalemate() {
            Some(GameResult::Stalemate)
        } else if self.position.is_insufficient_material() {
            Some(GameResult::InsufficientMaterial)
        } else {
            None
        }
    }
}

fn to_shakmaty(square: Square) -> Result<shakmaty::Square, RulesError> {
    let name = square.to_string();
    name.parse().map_err(|_| RulesError::InvalidSquare(name))
}

fn to_role(promotion: Promotion) -> Role {
    match promotion {
        Promotion::Queen => Role::Queen,
        Promotion::Rook => Role::Rook,
        Promotion::Bishop => Role::Bishop,
        Promotion::Knight => Role::Knight,
    }
}

fn from_role(role: Role) -> Option<Promotion> {
    match role {
        Role::Queen => Some(Promotion::Queen),
        Role::Rook => Some(Promotion::Rook),
        Role::Bishop => Some(Promotion::Bishop),
        Role::Knight => Some(Promotion::Knight),
        Role::Pawn | Role::King => None,
    }
}
