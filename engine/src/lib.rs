//! Computer opponent: a fixed-depth minimax advisor and an async task that
//! runs it without blocking the caller.

pub mod advisor;
pub mod eval;
pub mod search;

pub use advisor::{Advisor, AdvisorCommand, AdvisorError, AdvisorEvent};
pub use eval::{evaluate, piece_value};
pub use search::{best_move, best_move_with_rng};

/// Search depth used when the caller does not pick one.
pub const DEFAULT_DEPTH: u32 = 3;
