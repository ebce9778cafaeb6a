//! Seat registry: which connection plays which side.

use rookery_rules::Side;

/// Connection identifier (server-internal, allocated by the hub).
pub type ConnectionId = u64;

/// What a connection may do in the shared game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player(Side),
    Observer,
}

/// Binds at most one connection to each side.
///
/// Observers are not tracked. A freed seat goes to whoever calls
/// [`SeatRegistry::assign`] next.
#[derive(Debug, Clone, Default)]
pub struct SeatRegistry {
    white: Option<ConnectionId>,
    black: Option<ConnectionId>,
}

impl SeatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat a connection: white first, then black, then observer.
    ///
    /// A connection already holding a seat gets the same seat back.
    pub fn assign(&mut self, connection: ConnectionId) -> Role {
        if let Some(side) = self.side_of(connection) {
            return Role::Player(side);
        }
        for side in Side::ALL {
            let seat = self.seat_mut(side);
            if seat.is_none() {
                *seat = Some(connection);
                return Role::Player(side);
            }
        }
        Role::Observer
    }

    /// Free the seat held by `connection`, if any.
    pub fn release(&mut self, connection: ConnectionId) -> Option<Side> {
        let side = self.side_of(connection)?;
        *self.seat_mut(side) = None;
        Some(side)
    }

    /// Side held by `connection`.
    pub fn side_of(&self, connection: ConnectionId) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|&side| self.occupant(side) == Some(connection))
    }

    /// Connection holding `side`.
    pub fn occupant(&self, side: Side) -> Option<ConnectionId> {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    pub fn is_full(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    fn seat_mut(&mut self, side: Side) -> &mut Option<ConnectionId> {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }
}
