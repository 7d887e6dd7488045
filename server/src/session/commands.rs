use chess_proto::{ColorPreference, Participant, RemoteGameState};
use tokio::sync::{broadcast, oneshot};

use super::events::GameEvent;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Game not found: {0}")]
    NotFound(String),
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),
    #[error("Invalid time control: {0}")]
    InvalidTimeControl(String),
    #[error("Not a participant in this game")]
    NotAParticipant,
    #[error("Spectators cannot move")]
    SpectatorMove,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Waiting for an opponent")]
    WaitingForOpponent,
    #[error("Game is over")]
    GameOver,
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Promotion piece required for {0}")]
    PromotionRequired(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A join request as the game actor sees it.
#[derive(Debug, Clone, Default)]
pub struct JoinRequest {
    pub name: Option<String>,
    pub player_id: Option<String>,
    pub requested_color: Option<ColorPreference>,
}

#[derive(Debug, Clone)]
pub struct MoveCommand {
    pub player_id: String,
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
}

/// Result of a successful join, with a receiver subscribed before any
/// later state change.
#[derive(Debug)]
pub struct Joined {
    pub participant: Participant,
    pub state: RemoteGameState,
    pub events: broadcast::Receiver<GameEvent>,
}

/// Commands sent to the game actor. Each embeds a oneshot for the reply.
pub enum GameCommand {
    Join {
        request: JoinRequest,
        reply: oneshot::Sender<Result<Joined, GameError>>,
    },
    Leave {
        player_id: String,
        reply: oneshot::Sender<Result<RemoteGameState, GameError>>,
    },
    /// The participant's connection dropped. No reply.
    Disconnect {
        player_id: String,
    },
    MakeMove {
        command: MoveCommand,
        reply: oneshot::Sender<Result<RemoteGameState, GameError>>,
    },
    GetSnapshot {
        reply: oneshot::Sender<RemoteGameState>,
    },
    Subscribe {
        reply: oneshot::Sender<(RemoteGameState, broadcast::Receiver<GameEvent>)>,
    },
    Shutdown,
}
