//! Connected player registry for the authoritative server
//!
//! This module tracks every peer that has completed the negotiate handshake:
//! - Connection lifecycle (negotiate, disconnect, timeout)
//! - The authoritative per-player record that gets broadcast to everyone
//! - Ready flags used by the round state machine
//!
//! Players are keyed by transport address. A separate insertion-ordered key
//! list keeps broadcasts and ids stable across ticks. The network layer
//! holds the registry behind a reader/writer lock: iteration and broadcast
//! take read access, insertion and removal take write access.

use log::info;
use shared::{ConnectedPlayer, PlayerUpdate};
use std::collections::HashMap;
use std::net::SocketAddr;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Player records indexed by address
    players: HashMap<SocketAddr, ConnectedPlayer>,
    /// Addresses in the order they connected
    order: Vec<SocketAddr>,
    /// Next id handed out to a new connection
    next_id: u32,
}

impl ConnectionRegistry {
    /// Creates an empty registry. Player ids start at 1.
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
        }
    }

    /// Registers a peer if it isn't already known
    ///
    /// Returns the player's id and whether it was newly inserted. A peer
    /// that negotiates twice keeps its first id and state.
    pub fn add(&mut self, addr: SocketAddr, timestamp: u64) -> (u32, bool) {
        if let Some(existing) = self.players.get(&addr) {
            return (existing.id, false);
        }

        let id = self.next_id;
        self.next_id += 1;

        info!("Player {} connected from {}", id, addr);
        self.players
            .insert(addr, ConnectedPlayer::new(id, addr, timestamp));
        self.order.push(addr);

        (id, true)
    }

    /// Removes a peer, returning its last known record
    pub fn remove(&mut self, addr: &SocketAddr) -> Option<ConnectedPlayer> {
        let removed = self.players.remove(addr)?;
        self.order.retain(|a| a != addr);
        info!("Player {} disconnected from {}", removed.id, addr);
        Some(removed)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&ConnectedPlayer> {
        self.players.get(addr)
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.players.contains_key(addr)
    }

    /// Records activity from a peer. Unknown peers are ignored.
    pub fn touch(&mut self, addr: &SocketAddr, timestamp: u64) {
        if let Some(player) = self.players.get_mut(addr) {
            player.last_packet = player.last_packet.max(timestamp);
        }
    }

    /// Applies a player's self-reported state
    pub fn apply_update(&mut self, addr: &SocketAddr, update: &PlayerUpdate, timestamp: u64) -> bool {
        match self.players.get_mut(addr) {
            Some(player) => {
                player.apply_update(update, timestamp);
                true
            }
            None => false,
        }
    }

    /// Flips the ready flag, returning the new value
    pub fn toggle_ready(&mut self, addr: &SocketAddr) -> Option<bool> {
        let player = self.players.get_mut(addr)?;
        player.ready = !player.ready;
        Some(player.ready)
    }

    pub fn set_rolling(&mut self, addr: &SocketAddr) -> bool {
        match self.players.get_mut(addr) {
            Some(player) => {
                player.rolling = true;
                true
            }
            None => false,
        }
    }

    /// Subtracts damage from a player's life, clamped at zero
    pub fn apply_damage(&mut self, addr: &SocketAddr, damage: i32) -> Option<i32> {
        let player = self.players.get_mut(addr)?;
        player.take_damage(damage);
        Some(player.life)
    }

    pub fn clear_ready(&mut self) {
        for player in self.players.values_mut() {
            player.ready = false;
        }
    }

    /// True when at least one player is connected and every player is ready
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.ready)
    }

    /// Addresses of players with life left, in connection order
    pub fn alive_addrs(&self) -> Vec<SocketAddr> {
        self.iter()
            .filter(|player| player.is_alive())
            .map(|player| player.addr)
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    /// Removes peers silent for longer than `timeout_ms`
    ///
    /// Evicted peers are not notified. Returns the removed records.
    pub fn evict_stale(&mut self, now: u64, timeout_ms: u64) -> Vec<ConnectedPlayer> {
        let stale: Vec<SocketAddr> = self
            .iter()
            .filter(|player| now.saturating_sub(player.last_packet) > timeout_ms)
            .map(|player| player.addr)
            .collect();

        stale
            .iter()
            .filter_map(|addr| self.remove(addr))
            .collect()
    }

    /// Players in connection order
    pub fn iter(&self) -> impl Iterator<Item = &ConnectedPlayer> + '_ {
        self.order.iter().filter_map(|addr| self.players.get(addr))
    }

    /// Addresses in connection order, for broadcasting
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.order.clone()
    }

    /// Full player list as broadcast to clients
    pub fn snapshot(&self) -> Vec<ConnectedPlayer> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
