//! Server network layer handling UDP communications and game loop coordination

use crate::config::ServerConfig;
use crate::connections::ConnectionRegistry;
use crate::game::World;
use crate::round::{RoundAction, RoundDirector, RoundInputs};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::packet::{self, MAX_DATAGRAM_SIZE};
use shared::{get_timestamp, Event, Handshake, LevelSource, Packet, Payload, Rendezvous};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        payload: Payload,
        addr: SocketAddr,
    },
    BroadcastPacket {
        payload: Payload,
        exclude: Option<SocketAddr>,
    },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    connections: Arc<RwLock<ConnectionRegistry>>,
    world: World,
    director: RoundDirector,
    rng: StdRng,
    config: ServerConfig,
    /// Set once the first level starts; stops mediation keep-alives
    round_started: Arc<AtomicBool>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        config: ServerConfig,
        levels: Box<dyn LevelSource>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let world = World::new(levels)?;
        let director = RoundDirector::new(world.arena_count());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            connections: Arc::new(RwLock::new(ConnectionRegistry::new())),
            world,
            director,
            rng,
            config,
            round_started: Arc::new(AtomicBool::new(false)),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Shared handle to the connection registry
    pub fn connections(&self) -> Arc<RwLock<ConnectionRegistry>> {
        Arc::clone(&self.connections)
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
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

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let connections = Arc::clone(&self.connections);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { payload, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &payload, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { payload, exclude } => {
                        let addrs = {
                            let connections = connections.read().await;
                            connections.addrs()
                        };

                        let data = match packet::encode(&payload) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode {:?}: {}", payload.packet_type(), e);
                                continue;
                            }
                        };

                        for addr in addrs {
                            if Some(addr) == exclude {
                                continue;
                            }

                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to player at {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that sends the full player list to everyone
    fn spawn_player_broadcaster(&self) {
        let socket = Arc::clone(&self.socket);
        let connections = Arc::clone(&self.connections);
        let mut broadcast_interval = interval(self.config.player_broadcast_interval);
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            loop {
                broadcast_interval.tick().await;

                let (players, addrs) = {
                    let connections = connections.read().await;
                    (connections.snapshot(), connections.addrs())
                };

                if addrs.is_empty() {
                    continue;
                }

                let data = match packet::encode(&Payload::UpdatePlayers(players)) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to encode player list: {}", e);
                        continue;
                    }
                };

                for addr in addrs {
                    if let Err(e) = socket.send_to(&data, addr).await {
                        error!("Failed to send player list to {}: {}", addr, e);
                    }
                }
            }
        });
    }

    /// Spawns task that keeps the mediation registration fresh until the
    /// first level starts
    fn spawn_mediation_keep_alive(&self) {
        let Some(mediation_addr) = self.config.mediation_addr else {
            return;
        };

        let socket = Arc::clone(&self.socket);
        let round_started = Arc::clone(&self.round_started);
        let mut keep_alive_interval = interval(self.config.mediation_keep_alive_interval);
        keep_alive_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            loop {
                keep_alive_interval.tick().await;

                if round_started.load(Ordering::Relaxed) {
                    debug!("Round started, no longer keeping mediation registration alive");
                    break;
                }

                if let Err(e) =
                    Self::send_packet_impl(&socket, &Payload::KeepAlive, mediation_addr).await
                {
                    error!("Failed to send keep-alive to mediation: {}", e);
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        payload: &Payload,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = packet::encode(payload)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, payload: Payload, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { payload, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, payload: Payload, exclude: Option<SocketAddr>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { payload, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Announces this host under its keyword
    async fn register_with_mediation(&self) {
        let Some(mediation_addr) = self.config.mediation_addr else {
            return;
        };

        let payload = Payload::MatchHost(Rendezvous::new(self.config.keyword.clone()));
        match Self::send_packet_impl(&self.socket, &payload, mediation_addr).await {
            Ok(()) => info!(
                "Hosting as '{}' via mediation at {}",
                self.config.keyword, mediation_addr
            ),
            Err(e) => error!("Failed to register with mediation: {}", e),
        }
    }

    /// Adds a peer and answers with its id and observed address. Sending
    /// the answer is also what opens our side of the NAT mapping.
    async fn negotiate(&self, peer: SocketAddr) {
        let (player_id, _) = {
            let mut connections = self.connections.write().await;
            connections.add(peer, get_timestamp())
        };

        let handshake = Handshake {
            player_id,
            observed_addr: Some(peer),
        };
        self.send_packet(Payload::Negotiate(handshake), peer);
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        {
            let mut connections = self.connections.write().await;
            connections.touch(&addr, get_timestamp());
        }

        match packet.payload {
            Payload::MatchConnect(peer) => {
                if self.config.mediation_addr == Some(addr) {
                    info!("Mediation introduced {}", peer);
                    self.negotiate(peer).await;
                } else {
                    warn!("Ignoring match-connect from {}, not our mediation server", addr);
                }
            }

            Payload::Negotiate(_) => {
                self.negotiate(addr).await;
            }

            Payload::KeepAlive => {}

            Payload::Disconnect => {
                let mut connections = self.connections.write().await;
                connections.remove(&addr);
            }

            Payload::UpdateCurrentPlayer(update) => {
                let mut connections = self.connections.write().await;
                if !connections.apply_update(&addr, &update, get_timestamp()) {
                    debug!("Update from unknown peer {}", addr);
                }
            }

            Payload::ClientToggleReady => {
                if !self.director.accepts_ready_toggle() {
                    debug!("Ignoring ready toggle from {} while {:?}", addr, self.director.phase());
                    return;
                }

                let mut connections = self.connections.write().await;
                if let Some(ready) = connections.toggle_ready(&addr) {
                    info!("Player at {} is {}", addr, if ready { "ready" } else { "not ready" });
                }
            }

            Payload::PlayerRoll => {
                let mut connections = self.connections.write().await;
                connections.set_rolling(&addr);
            }

            Payload::PlayerHit(hit) => {
                {
                    let mut connections = self.connections.write().await;
                    if connections.apply_damage(&hit.player, hit.damage).is_none() {
                        debug!("Hit reported for unknown player {}", hit.player);
                        return;
                    }
                }
                self.broadcast_packet(Payload::PlayerHit(hit), None);
            }

            Payload::BulletStart(bullet) => {
                self.broadcast_packet(Payload::BulletStart(bullet), None);
                self.world.add_bullet(bullet);
            }

            Payload::ModifierChosen(modifiers) => {
                if !self.director.choose_modifier() {
                    debug!("Ignoring modifier choice from {}", addr);
                    return;
                }

                self.world.add_modifiers(&modifiers);
                self.broadcast_packet(
                    Payload::ModifiersUpdated(self.world.modifiers().clone()),
                    None,
                );
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

    async fn apply_round_action(&mut self, action: RoundAction) {
        match action {
            RoundAction::LoadLevel(level) => {
                if let Err(e) = self.world.load_level(level) {
                    error!("Failed to load {}: {}", level, e);
                }
            }

            RoundAction::UnregisterFromMediation => {
                self.round_started.store(true, Ordering::Relaxed);

                if let Some(mediation_addr) = self.config.mediation_addr {
                    let payload =
                        Payload::MatchStart(Rendezvous::new(self.config.keyword.clone()));
                    self.send_packet(payload, mediation_addr);
                }
            }

            RoundAction::SpawnWave => {
                let wave = {
                    let connections = self.connections.read().await;
                    self.world.spawn_wave(&connections, &mut self.rng)
                };

                if !wave.is_empty() {
                    self.broadcast_packet(Payload::ServerEvent(Event::spawn_enemies(wave)), None);
                }
            }

            RoundAction::ResetLobby => {
                if let Err(e) = self.world.reset_for_lobby() {
                    error!("Failed to reload the lobby: {}", e);
                }
                {
                    let mut connections = self.connections.write().await;
                    connections.clear_ready();
                }
                self.broadcast_packet(
                    Payload::ModifiersUpdated(self.world.modifiers().clone()),
                    None,
                );
            }
        }
    }

    /// Runs one simulation step
    async fn tick(&mut self) {
        let now = get_timestamp();

        // Bullets
        let hits = {
            let connections = self.connections.read().await;
            self.world.step_bullets(&connections)
        };
        if !hits.is_empty() {
            let mut connections = self.connections.write().await;
            for hit in &hits {
                connections.apply_damage(&hit.player, hit.damage);
            }
        }
        for hit in hits {
            self.broadcast_packet(Payload::PlayerHit(hit), None);
        }

        // Round state
        let inputs = {
            let connections = self.connections.read().await;
            RoundInputs {
                all_ready: connections.all_ready(),
                alive_players: connections.alive_count(),
                enemies_alive: self.world.enemies_alive(),
            }
        };
        let previous = self.director.state().clone();
        let actions = self.director.poll(inputs, now, &mut self.rng);
        for action in actions {
            self.apply_round_action(action).await;
        }
        if *self.director.state() != previous {
            self.broadcast_packet(
                Payload::ServerStateChanged(self.director.state().clone()),
                None,
            );
        }
        self.director.tick_cooldown();

        // Enemies
        {
            let connections = self.connections.read().await;
            self.world.step_enemies(&connections);
        }

        // Stale players
        let timeout_ms = self.config.player_timeout.as_millis() as u64;
        let evicted = {
            let mut connections = self.connections.write().await;
            connections.evict_stale(now, timeout_ms)
        };
        for player in evicted {
            info!("Player {} at {} timed out", player.id, player.addr);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_player_broadcaster();
        self.register_with_mediation().await;
        self.spawn_mediation_keep_alive();

        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.tick().await;
                    ticks += 1;

                    if ticks % 600 == 0 {
                        let players = self.connections.read().await.len();
                        if players > 0 {
                            debug!(
                                "Tick {}: {} players, {} enemies, {} bullets, {:?}",
                                ticks,
                                players,
                                self.world.enemies().len(),
                                self.world.bullets().len(),
                                self.director.phase()
                            );
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
