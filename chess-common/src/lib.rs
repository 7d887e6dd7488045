//! Common utilities for ChessTTY
//!
//! This crate provides shared square, piece and move-notation conversions
//! used across the ChessTTY rules engine, server, and client components.

pub mod converters;
pub mod uci;

// Re-export commonly used items
pub use converters::*;
pub use uci::*;
