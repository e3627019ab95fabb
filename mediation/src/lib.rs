//! # Mediation Service
//!
//! Rendezvous server that lets a host and a joiner learn each other's public
//! address so they can punch through NAT and talk directly.
//!
//! A host registers a join keyword (`match-host`). A joiner asks for that
//! keyword (`match-find`) and both sides receive a `match-connect` carrying
//! the other's address. Hosts keep their entry alive with keep-alives until
//! their round starts (`match-start`) or they go quiet for too long.
//!
//! ## Module Organization
//!
//! - [`registry`]: keyword to host address map with staleness sweep
//! - [`network`]: UDP loop, sweep task and configuration
//!
//! ```rust,no_run
//! use mediation::{MediationConfig, MediationServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = MediationServer::bind(MediationConfig::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod network;
pub mod registry;

pub use network::{MediationConfig, MediationServer};
pub use registry::{HostEntry, HostRegistry};
