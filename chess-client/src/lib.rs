//! Synchronization client for chesstty-server
//!
//! Mirrors one server-authoritative game over a persistent connection and
//! keeps the mirror consistent across disconnects.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chess_client::{CreateGame, MemoryTokenStore, ReconnectPolicy, SyncClient, TcpConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SyncClient::spawn(
//!         Box::new(TcpConnector::new("127.0.0.1:7878")),
//!         Arc::new(MemoryTokenStore::new()),
//!         ReconnectPolicy::default(),
//!     );
//!     client.connect().await?;
//!     let joined = client.create_game(CreateGame::default()).await?;
//!     println!("Created game: {}", joined.game_id);
//!     Ok(())
//! }
//! ```

mod client;
pub mod config;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod state;
pub mod store;
pub mod transport;

pub use client::{ClientEvent, GameJoined, JoinOptions, SyncClient};
pub use config::{ReconnectPolicy, DEFAULT_SERVER_ADDR};
pub use error::{ClientError, ClientResult};
pub use state::{ConnectionState, Membership, SyncState};
pub use store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};
pub use transport::{Connection, Connector, TcpConnector};

// Re-export wire types for convenience
pub use chess_proto::*;
