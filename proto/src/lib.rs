//! Wire types for the game synchronization protocol.
//!
//! Every frame is a single JSON object on its own line. Clients send
//! [`ClientRequest`]s, each carrying an id that the server echoes back in the
//! matching [`Ack`]. The server may also send unsolicited [`Push`]es at any
//! time.

pub mod codec;
pub mod messages;
pub mod types;

pub use codec::{decode_line, encode_line, read_frame, ProtocolError, MAX_FRAME_LEN};
pub use messages::{
    Ack, ClientRequest, CreateGame, FetchGame, JoinGame, LeaveGame, MakeMove, Push, Request,
    ServerMessage,
};
pub use types::{
    ClockSnapshot, Color, ColorPreference, DrawReason, MoveRecord, Participant, Players,
    RemoteGameState, RemoteStatus, Role, SeatInfo, TimeControl,
};
