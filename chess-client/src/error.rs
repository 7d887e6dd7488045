//! Error types for the sync client

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Not in a game")]
    NotInGame,

    #[error("Not a participant: {0}")]
    NotAParticipant(String),

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Connection error: {0}")]
    Connection(String),

    /// The server acknowledged with `ok = false`. Carries its message verbatim.
    #[error("{0}")]
    ServerRejected(String),

    #[error("Server returned invalid data: {0}")]
    InvalidResponse(String),

    #[error("Client task closed")]
    Closed,
}
