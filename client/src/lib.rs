//! # Game Client Library
//!
//! This library provides the client side of the co-op horde game: finding a
//! host, negotiating with it, simulating the local player and following the
//! authoritative round state the host broadcasts.
//!
//! ## Architecture Overview
//!
//! The client owns its own movement. Position, aim, weapon and rolls are
//! simulated locally and reported to the host every few frames; the host
//! only keeps the latest report. Everything else comes from the host: the
//! player list, bullets, enemy waves, hits and round transitions.
//!
//! ### Interpolation
//! Remote players arrive as samples several frames apart. Between two
//! samples they are drawn on the straight line from the previous sample to
//! the current one, so they never jump and never overshoot.
//!
//! ### Local Enemy Simulation
//! Enemies are spawned by the host and then stepped by every client on its
//! own, path-finding toward their target each frame. Contact damage to the
//! local player is reported back to the host, which broadcasts the hit.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Rendezvous through the mediation service, the negotiate handshake and the
//! session loop that ties packets, intents and frames together.
//!
//! ### Game Module (`game`)
//! The [`ClientWorld`] snapshot and the [`ClientEvent`]s derived from host
//! broadcasts.
//!
//! ### Player, Input and Interpolation Modules
//! The locally controlled player, the [`Intent`]s that drive it and the
//! smoothing applied to everyone else.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{Client, ClientConfig, Intent, Session};
//! use shared::BuiltinLevels;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::Join {
//!         mediation: "203.0.113.7:8080".parse()?,
//!         keyword: "ABCD".to_string(),
//!     };
//!
//!     let (client, mut handle) =
//!         Client::connect(ClientConfig::default(), session, Box::new(BuiltinLevels)).await?;
//!     tokio::spawn(client.run());
//!
//!     handle.intents.send(Intent::ToggleReady)?;
//!     while let Some(event) = handle.events.recv().await {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod player;

pub use config::ClientConfig;
pub use error::ClientError;
pub use game::{ClientEvent, ClientWorld, FrameOutput};
pub use input::{HeldInput, Intent};
pub use network::{Client, ClientHandle, Outbound, Session};
