use shared::SERVER_PORT;
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime settings for the authoritative server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Rendezvous service to register with. `None` runs a LAN-only host.
    pub mediation_addr: Option<SocketAddr>,
    /// Join keyword players use to find this host
    pub keyword: String,
    pub tick_interval: Duration,
    /// How often the full player list goes out to everyone
    pub player_broadcast_interval: Duration,
    pub mediation_keep_alive_interval: Duration,
    /// Players silent for longer than this are dropped
    pub player_timeout: Duration,
    /// Fixed seed for level picks and spawns. Random when unset.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", SERVER_PORT),
            mediation_addr: None,
            keyword: "ABCD".to_string(),
            tick_interval: Duration::from_millis(16),
            player_broadcast_interval: Duration::from_millis(50),
            mediation_keep_alive_interval: Duration::from_secs(2),
            player_timeout: Duration::from_millis(2_500),
            seed: None,
        }
    }
}
