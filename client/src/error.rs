use shared::{LevelError, PacketError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),
    #[error("level error: {0}")]
    Level(#[from] LevelError),
    /// The mediation service never introduced us to a host
    #[error("no host found for keyword within {0:?}")]
    RendezvousTimeout(Duration),
    /// The host never answered our negotiate
    #[error("host at {0} did not answer")]
    NotConnected(std::net::SocketAddr),
}
