//! Rendezvous service network layer
//!
//! One task receives and decodes datagrams onto a queue, a second sweeps
//! stale hosts every second, and [`MediationServer::run`] consumes the queue.
//! No game traffic passes through here: once both sides hold each other's
//! address they talk directly.

use crate::registry::HostRegistry;
use log::{debug, error, info, warn};
use shared::packet::{self, MAX_DATAGRAM_SIZE};
use shared::{get_timestamp, Packet, Payload, Rendezvous, MEDIATION_PORT};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct MediationConfig {
    pub bind_addr: String,
    /// Hosts silent for longer than this are evicted
    pub host_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for MediationConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", MEDIATION_PORT),
            host_timeout: Duration::from_secs(7),
            sweep_interval: Duration::from_secs(1),
        }
    }
}

/// Messages sent from the receiver task to the main loop
#[derive(Debug)]
pub enum MediationMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
}

pub struct MediationServer {
    socket: Arc<UdpSocket>,
    registry: Arc<RwLock<HostRegistry>>,
    config: MediationConfig,

    tx: mpsc::UnboundedSender<MediationMessage>,
    rx: mpsc::UnboundedReceiver<MediationMessage>,
}

impl MediationServer {
    pub async fn bind(config: MediationConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Mediation server listening on {}", socket.local_addr()?);

        let (tx, rx) = mpsc::unbounded_channel();

        Ok(Self {
            socket,
            registry: Arc::new(RwLock::new(HostRegistry::new())),
            config,
            tx,
            rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Shared handle to the registry, for inspection while the server runs
    pub fn registry(&self) -> Arc<RwLock<HostRegistry>> {
        Arc::clone(&self.registry)
    }

    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) = tx.send(MediationMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn spawn_sweeper(&self) {
        let registry = Arc::clone(&self.registry);
        let timeout_ms = self.config.host_timeout.as_millis() as u64;
        let mut sweep_interval = interval(self.config.sweep_interval);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            loop {
                sweep_interval.tick().await;

                let evicted = {
                    let mut registry = registry.write().await;
                    registry.sweep_stale(get_timestamp(), timeout_ms)
                };

                for entry in evicted {
                    info!(
                        "Host {} timed out, keyword '{}' released",
                        entry.addr, entry.keyword
                    );
                }
            }
        });
    }

    async fn send(&self, payload: &Payload, addr: SocketAddr) {
        let data = match packet::encode(payload) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode {:?}: {}", payload.packet_type(), e);
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&data, addr).await {
            error!("Failed to send to {}: {}", addr, e);
        }
    }

    async fn handle_packet(&self, packet: Packet, addr: SocketAddr) {
        match packet.payload {
            Payload::MatchHost(Rendezvous { keyword }) => {
                let mut registry = self.registry.write().await;
                if !registry.register(&keyword, addr, get_timestamp()) {
                    debug!("Keyword '{}' already hosted, ignoring {}", keyword, addr);
                }
            }

            Payload::MatchFind(Rendezvous { keyword }) => {
                let host = {
                    let registry = self.registry.read().await;
                    registry.find(&keyword)
                };

                match host {
                    Some(host) => {
                        info!("Match found for '{}': {} <-> {}", keyword, host, addr);
                        self.send(&Payload::MatchConnect(addr), host).await;
                        self.send(&Payload::MatchConnect(host), addr).await;
                    }
                    None => debug!("No host for keyword '{}' requested by {}", keyword, addr),
                }
            }

            Payload::MatchStart(Rendezvous { keyword }) => {
                let mut registry = self.registry.write().await;
                if registry.unregister(&keyword) {
                    info!(
                        "{}'s round has started, '{}' removed from open lobbies",
                        addr, keyword
                    );
                }
            }

            Payload::KeepAlive => {
                let mut registry = self.registry.write().await;
                registry.keep_alive(addr, get_timestamp());
            }

            other => {
                warn!(
                    "Unexpected packet type {:?} from {}",
                    other.packet_type(),
                    addr
                );
            }
        }
    }

    /// Runs until the receiver task stops
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_sweeper();

        info!("Mediation server started");

        while let Some(message) = self.rx.recv().await {
            match message {
                MediationMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
            }
        }

        info!("Mediation server shutting down");
        Ok(())
    }
}
