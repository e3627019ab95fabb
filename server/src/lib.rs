//! # Game Server Library
//!
//! This library provides the authoritative server for the co-op horde game.
//! The host runs it alongside (or instead of) a local client; every other
//! player talks to it directly over UDP once the mediation service has
//! introduced them.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns the round state, the live enemies and every bullet in
//! flight. Players report their own position and the server folds those
//! reports into the list it broadcasts back, so movement stays responsive
//! while combat outcomes have a single source of truth.
//!
//! ### Connection Management
//! Handles the lifecycle of player connections:
//! - Negotiation with peers introduced by the mediation service
//! - Ready flags for the waiting room
//! - Disconnection and timeout eviction
//!
//! ### Round Flow
//! A polled state machine moves the session through the waiting room, the
//! start countdown, level play, the modifier pick after a cleared level and
//! the game over screen. Every transition is broadcast to all players.
//!
//! ## Module Organization
//!
//! ### Connections Module (`connections`)
//! The registry of connected players, keyed by address and kept in
//! connection order. Shared with background tasks behind a reader/writer
//! lock.
//!
//! ### Round Module (`round`)
//! The round state machine. Pure: it takes a summary of the world and returns
//! the side effects to perform.
//!
//! ### Game Module (`game`)
//! The simulated world: current level, bullets, enemies and accumulated
//! modifiers. Bullet hits, enemy waves and enemy movement live here.
//!
//! ### Network Module (`network`)
//! UDP socket, packet dispatch and the fixed-rate tick loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Server, ServerConfig};
//! use shared::BuiltinLevels;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         mediation_addr: Some("203.0.113.7:8080".parse()?),
//!         keyword: "ABCD".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     // Registers with the mediation service, then:
//!     // - negotiates with every player the mediation service introduces
//!     // - runs the round state machine and the world at ~60Hz
//!     // - broadcasts the player list every 50ms
//!     // - evicts players silent for 2.5s
//!     let mut server = Server::new(config, Box::new(BuiltinLevels)).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The server uses an event-driven architecture with internal async tasks:
//! - **Network Receiver**: decodes incoming datagrams onto the main queue
//! - **Network Sender**: drains the outgoing queue, sends and broadcasts
//! - **Player Broadcaster**: sends the full player list on a fixed interval
//! - **Mediation Keep-Alive**: keeps the host registered until play begins
//! - **Main Game Loop**: handles packets and runs the tick

pub mod config;
pub mod connections;
pub mod game;
pub mod network;
pub mod round;

pub use config::ServerConfig;
pub use connections::ConnectionRegistry;
pub use network::Server;
