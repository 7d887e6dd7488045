//! Authoritative game server for ChessTTY multiplayer.
//!
//! Each game is an actor ([`session`]) that owns its rules state, seats and
//! clock. The [`service`] module speaks the line-delimited JSON protocol
//! from `chess-proto` over TCP.

pub mod config;
pub mod service;
pub mod session;

pub use service::serve;
pub use session::{GameHandle, GameManager};
