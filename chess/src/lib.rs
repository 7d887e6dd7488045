pub mod clock;
pub mod fen;
pub mod game;
pub mod pgn;
pub mod position;
pub mod rules;
pub mod status;
pub mod types;

pub use clock::{ClockState, DEFAULT_INITIAL_MS, TICK_INTERVAL};
pub use cozy_chess::{File, Rank, Square};
pub use fen::FenError;
pub use game::{Game, GameError, GamePhase, HistoryEntry};
pub use pgn::san::SanError;
pub use position::{CastlingRights, Position};
pub use rules::{Move, MoveError, MoveRequest, ParseMoveError};
pub use status::{derive_status, DrawReason, GameStatus};
pub use types::{CastleSide, PieceColor, PieceKind};
