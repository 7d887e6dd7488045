//! Pure, synchronous model of what the client knows.
//!
//! Connection and membership are independent: losing the transport does not
//! take the client out of its game, so the actor can rejoin afterwards.

use chess_proto::{Participant, RemoteGameState};

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Membership {
    #[default]
    NotInGame,
    InGame {
        game_id: String,
        participant: Participant,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SyncState {
    connection: ConnectionState,
    membership: Membership,
    mirror: Option<RemoteGameState>,
    last_error: Option<String>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    /// The last authoritative snapshot received, if any.
    pub fn mirror(&self) -> Option<&RemoteGameState> {
        self.mirror.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn game_id(&self) -> Option<&str> {
        match &self.membership {
            Membership::InGame { game_id, .. } => Some(game_id),
            Membership::NotInGame => None,
        }
    }

    pub fn participant(&self) -> Option<&Participant> {
        match &self.membership {
            Membership::InGame { participant, .. } => Some(participant),
            Membership::NotInGame => None,
        }
    }

    /// Returns true when the state actually changed.
    pub fn set_connection(&mut self, connection: ConnectionState) -> bool {
        if self.connection == connection {
            return false;
        }
        tracing::debug!(from = ?self.connection, to = ?connection, "Connection state changed");
        self.connection = connection;
        true
    }

    pub fn enter_game(&mut self, game_id: String, participant: Participant) {
        self.membership = Membership::InGame {
            game_id,
            participant,
        };
    }

    /// Drop membership and the mirror. Persisted tokens are not touched.
    pub fn leave_game(&mut self) {
        self.membership = Membership::NotInGame;
        self.replace_mirror(None);
    }

    /// The only way the mirror changes: wholesale replacement, never a merge.
    pub fn replace_mirror(&mut self, state: Option<RemoteGameState>) {
        self.mirror = state;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Local checks made before a move is sent, so hopeless requests never
    /// cost a round trip. Returns the game id and player id to send with.
    pub fn check_can_move(&self) -> ClientResult<(&str, &str)> {
        let Membership::InGame {
            game_id,
            participant,
        } = &self.membership
        else {
            return Err(ClientError::NotInGame);
        };

        if !participant.is_player() {
            return Err(ClientError::NotAParticipant(
                "spectators cannot move".to_string(),
            ));
        }
        let Some(color) = participant.color else {
            return Err(ClientError::NotAParticipant(
                "no colour assigned".to_string(),
            ));
        };

        if let Some(mirror) = &self.mirror {
            if mirror.side_to_move != color {
                return Err(ClientError::NotYourTurn);
            }
        }

        Ok((game_id, &participant.player_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_proto::{Color, Players, RemoteStatus, Role};

    fn state(side_to_move: Color, fen: &str) -> RemoteGameState {
        RemoteGameState {
            game_id: "g1".into(),
            fen: fen.into(),
            side_to_move,
            history: vec![],
            status: RemoteStatus::Playing { in_check: false },
            clock: None,
            players: Players::default(),
            spectators: 0,
        }
    }

    fn player(color: Color) -> Participant {
        Participant {
            player_id: "p1".into(),
            role: Role::Player,
            color: Some(color),
        }
    }

    #[test]
    fn test_initial_state() {
        let s = SyncState::new();
        assert_eq!(s.connection(), &ConnectionState::Idle);
        assert_eq!(s.membership(), &Membership::NotInGame);
        assert!(s.mirror().is_none());
        assert_eq!(s.check_can_move(), Err(ClientError::NotInGame));
    }

    #[test]
    fn test_set_connection_reports_change() {
        let mut s = SyncState::new();
        assert!(s.set_connection(ConnectionState::Connecting));
        assert!(!s.set_connection(ConnectionState::Connecting));
        assert!(s.set_connection(ConnectionState::Connected));
    }

    #[test]
    fn test_spectator_cannot_move() {
        let mut s = SyncState::new();
        s.enter_game(
            "g1".into(),
            Participant {
                player_id: "s1".into(),
                role: Role::Spectator,
                color: None,
            },
        );
        assert!(matches!(
            s.check_can_move(),
            Err(ClientError::NotAParticipant(_))
        ));
    }

    #[test]
    fn test_turn_check_uses_mirror() {
        let mut s = SyncState::new();
        s.enter_game("g1".into(), player(Color::Black));
        s.replace_mirror(Some(state(Color::White, "fen-a")));
        assert_eq!(s.check_can_move(), Err(ClientError::NotYourTurn));

        s.replace_mirror(Some(state(Color::Black, "fen-b")));
        assert_eq!(s.check_can_move(), Ok(("g1", "p1")));
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut s = SyncState::new();
        let mut first = state(Color::White, "fen-a");
        first.spectators = 3;
        s.replace_mirror(Some(first));

        let second = state(Color::Black, "fen-b");
        s.replace_mirror(Some(second.clone()));
        assert_eq!(s.mirror(), Some(&second));
    }

    #[test]
    fn test_leave_clears_membership_and_mirror() {
        let mut s = SyncState::new();
        s.enter_game("g1".into(), player(Color::White));
        s.replace_mirror(Some(state(Color::White, "fen-a")));
        s.leave_game();
        assert_eq!(s.membership(), &Membership::NotInGame);
        assert!(s.mirror().is_none());
        assert_eq!(s.game_id(), None);
    }
}
