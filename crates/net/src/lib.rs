//! Pentago Network Library
//!
//! TCP transport for Pentago games over a `~` delimited line protocol.
//!
//! # Architecture
//!
//! - **Server**: accepts connections, pairs queued players and runs each game
//!   on its own session thread
//! - **Client**: connects to a server, mirrors the board, optionally lets an
//!   AI strategy answer its turns
//! - **Protocol**: one message per newline terminated line
//!
//! # Usage
//!
//! ```ignore
//! let server = Server::start(ServerConfig::default()).await?;
//!
//! let mut client = Client::connect(server.addr(), "my client").await?;
//! client.login("alice").await?;
//! client.play_with(Box::new(ExpertStrategy::new())).await?;
//!
//! while let Some(event) = client.next_event().await {
//!     if let ClientEvent::GameOver(result) = event {
//!         println!("{result}");
//!         break;
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
mod frame;
pub mod lobby;
pub mod observer;
pub mod protocol;
pub mod server;
pub mod state;

pub use client::{Client, ClientEvent};
pub use config::ServerConfig;
pub use error::{Error, Result};
pub use lobby::{Lobby, Peer, QueueOutcome};
pub use observer::NetworkObserver;
pub use protocol::{Expansion, Message, MessageKind, DELIMITER};
pub use server::Server;
pub use state::ConnectionState;

/// Default port for Pentago servers
pub const DEFAULT_PORT: u16 = 7331;
