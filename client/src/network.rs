//! Client network layer: rendezvous, handshake and the session loop

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::game::{ClientEvent, ClientWorld};
use crate::input::Intent;
use log::{debug, error, info, warn};
use shared::packet::{self, MAX_DATAGRAM_SIZE};
use shared::{Handshake, HitInfo, LevelSource, Packet, Payload, PlayerUpdate, Rendezvous};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, sleep, timeout_at, Instant, MissedTickBehavior};

/// How to find the host
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    /// Host address is already known
    Local(SocketAddr),
    /// Ask the mediation service for the host registered under `keyword`
    Join {
        mediation: SocketAddr,
        keyword: String,
    },
}

/// The application's side of a running session
pub struct ClientHandle {
    pub world: Arc<RwLock<ClientWorld>>,
    pub events: mpsc::UnboundedReceiver<ClientEvent>,
    pub intents: mpsc::UnboundedSender<Intent>,
}

/// Fire-and-forget sends to the host. Failures are logged, not returned.
#[derive(Clone)]
pub struct Outbound {
    socket: Arc<UdpSocket>,
    host: SocketAddr,
}

impl Outbound {
    pub async fn send(&self, payload: &Payload) {
        let data = match packet::encode(payload) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode {:?}: {}", payload.packet_type(), e);
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&data, self.host).await {
            error!("Failed to send {:?} to host: {}", payload.packet_type(), e);
        }
    }

    pub async fn send_position(&self, update: PlayerUpdate) {
        self.send(&Payload::UpdateCurrentPlayer(update)).await;
    }

    pub async fn report_hit(&self, hit: HitInfo) {
        self.send(&Payload::PlayerHit(hit)).await;
    }

    pub async fn keep_alive(&self) {
        self.send(&Payload::KeepAlive).await;
    }

    pub async fn disconnect(&self) {
        self.send(&Payload::Disconnect).await;
    }
}

/// A client connected to a host
pub struct Client {
    socket: Arc<UdpSocket>,
    host: SocketAddr,
    config: ClientConfig,
    world: Arc<RwLock<ClientWorld>>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    intents_rx: mpsc::UnboundedReceiver<Intent>,
}

impl Client {
    /// Finds the host, negotiates with it and returns the client together
    /// with the handle the application drives it through
    pub async fn connect(
        config: ClientConfig,
        session: Session,
        levels: Box<dyn LevelSource>,
    ) -> Result<(Client, ClientHandle), ClientError> {
        let socket = UdpSocket::bind(&config.bind_addr).await?;
        let mut world = ClientWorld::new(levels, &config)?;

        let (host, early) = match session {
            Session::Local(host) => (host, None),
            Session::Join { mediation, keyword } => {
                Self::rendezvous(&socket, mediation, &keyword, config.rendezvous_timeout).await?
            }
        };

        info!("Negotiating with host at {}", host);
        send_to(&socket, &Payload::Negotiate(Handshake::hello()), host).await?;

        let handshake = match early {
            Some((handshake, from)) if from == host => handshake,
            _ => Self::await_handshake(&socket, host, config.rendezvous_timeout).await?,
        };
        world.set_identity(&handshake);

        let world = Arc::new(RwLock::new(world));
        let (events_tx, events) = mpsc::unbounded_channel();
        let (intents, intents_rx) = mpsc::unbounded_channel();

        let client = Client {
            socket: Arc::new(socket),
            host,
            config,
            world: Arc::clone(&world),
            events_tx,
            intents_rx,
        };
        let handle = ClientHandle {
            world,
            events,
            intents,
        };

        Ok((client, handle))
    }

    pub fn host(&self) -> SocketAddr {
        self.host
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn outbound(&self) -> Outbound {
        Outbound {
            socket: Arc::clone(&self.socket),
            host: self.host,
        }
    }

    /// Asks the mediation service for a host. A negotiate from the host may
    /// overtake the introduction; it is handed back so it isn't lost.
    async fn rendezvous(
        socket: &UdpSocket,
        mediation: SocketAddr,
        keyword: &str,
        wait: Duration,
    ) -> Result<(SocketAddr, Option<(Handshake, SocketAddr)>), ClientError> {
        info!("Looking for host '{}' via mediation at {}", keyword, mediation);
        send_to(socket, &Payload::MatchFind(Rendezvous::new(keyword)), mediation).await?;

        let deadline = Instant::now() + wait;
        let mut early = None;

        loop {
            let Some((packet, from)) = recv_until(socket, deadline).await? else {
                return Err(ClientError::RendezvousTimeout(wait));
            };

            match packet.payload {
                Payload::MatchConnect(host) if from == mediation => {
                    info!("Mediation introduced host at {}", host);
                    return Ok((host, early));
                }
                Payload::Negotiate(handshake) => {
                    debug!("Early negotiate from {}", from);
                    early = Some((handshake, from));
                }
                other => debug!("Ignoring {:?} from {} during rendezvous", other.packet_type(), from),
            }
        }
    }

    async fn await_handshake(
        socket: &UdpSocket,
        host: SocketAddr,
        wait: Duration,
    ) -> Result<Handshake, ClientError> {
        let deadline = Instant::now() + wait;

        loop {
            let Some((packet, from)) = recv_until(socket, deadline).await? else {
                return Err(ClientError::NotConnected(host));
            };

            match packet.payload {
                Payload::Negotiate(handshake) if from == host => return Ok(handshake),
                other => debug!("Ignoring {:?} from {} during handshake", other.packet_type(), from),
            }
        }
    }

    /// Spawns task that forwards decoded packets from the host
    fn spawn_network_receiver(&self, packet_tx: mpsc::UnboundedSender<Packet>) {
        let socket = Arc::clone(&self.socket);
        let host = self.host;

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if addr != host {
                            debug!("Dropping packet from stranger {}", addr);
                            continue;
                        }
                        match Packet::decode(&buffer[..len]) {
                            Ok(packet) => {
                                if packet_tx.send(packet).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping packet from host: {}", e),
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Applies one packet from the host. Returns false when the host ended
    /// the session.
    async fn handle_packet(&self, packet: Packet) -> bool {
        let mut events = Vec::new();

        {
            let mut world = self.world.write().await;
            match packet.payload {
                Payload::Negotiate(handshake) => world.set_identity(&handshake),
                Payload::UpdatePlayers(players) => world.apply_player_list(players),
                Payload::BulletStart(bullet) => world.add_bullet(bullet),
                Payload::PlayerHit(hit) => events.extend(world.apply_hit(&hit)),
                Payload::ServerEvent(event) => events.extend(world.apply_server_event(event)),
                Payload::ServerStateChanged(state) => {
                    events.extend(world.apply_round_state(state))
                }
                Payload::ModifiersUpdated(modifiers) => world.modifiers = modifiers,
                Payload::KeepAlive => {}
                Payload::Disconnect => {
                    info!("Host closed the session");
                    return false;
                }
                other => warn!("Unexpected packet type: {:?}", other.packet_type()),
            }
        }

        for event in events {
            // nobody listening is fine
            let _ = self.events_tx.send(event);
        }
        true
    }

    /// Runs the session until the application quits or the host leaves
    pub async fn run(mut self) -> Result<(), ClientError> {
        let (packet_tx, mut packet_rx) = mpsc::unbounded_channel();
        self.spawn_network_receiver(packet_tx);

        let outbound = self.outbound();
        let keep_alive_interval = self.config.keep_alive_interval;

        let mut frame_interval = interval(self.config.frame_interval);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let idle = sleep(keep_alive_interval);
        tokio::pin!(idle);

        info!("Session with {} started", self.host);

        loop {
            tokio::select! {
                packet = packet_rx.recv() => {
                    let Some(packet) = packet else {
                        warn!("Receiver stopped");
                        break;
                    };
                    idle.as_mut().reset(Instant::now() + keep_alive_interval);
                    if !self.handle_packet(packet).await {
                        return Ok(());
                    }
                },

                intent = self.intents_rx.recv() => {
                    match intent {
                        Some(Intent::Quit) | None => {
                            info!("Leaving session");
                            break;
                        }
                        Some(intent) => {
                            let payload = self.world.write().await.apply_intent(&intent);
                            if let Some(payload) = payload {
                                outbound.send(&payload).await;
                            }
                        }
                    }
                },

                _ = frame_interval.tick() => {
                    let output = self.world.write().await.frame();
                    if let Some(update) = output.position {
                        outbound.send_position(update).await;
                    }
                    for hit in output.hits {
                        outbound.report_hit(hit).await;
                    }
                },

                _ = &mut idle => {
                    debug!("Host quiet, sending keep-alive");
                    outbound.keep_alive().await;
                    idle.as_mut().reset(Instant::now() + keep_alive_interval);
                },
            }
        }

        outbound.disconnect().await;
        Ok(())
    }
}

async fn send_to(socket: &UdpSocket, payload: &Payload, addr: SocketAddr) -> Result<(), ClientError> {
    let data = packet::encode(payload)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

/// Next decodable packet, or `None` once `deadline` passes
async fn recv_until(
    socket: &UdpSocket,
    deadline: Instant,
) -> Result<Option<(Packet, SocketAddr)>, ClientError> {
    let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (len, from) = match timeout_at(deadline, socket.recv_from(&mut buffer)).await {
            Ok(received) => received?,
            Err(_) => return Ok(None),
        };

        match Packet::decode(&buffer[..len]) {
            Ok(packet) => return Ok(Some((packet, from))),
            Err(e) => warn!("Dropping packet from {}: {}", from, e),
        }
    }
}
