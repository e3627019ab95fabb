use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::packet::PlayerUpdate;
use crate::weapon::WeaponType;
use crate::{Position, PLAYER_LIFE};

/// Server-side record for one peer, keyed by its transport address.
///
/// A player whose life reaches zero is downed but stays registered until it
/// times out. `dead_position` follows the player while alive and freezes
/// where it went down, so enemies have somewhere to walk to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConnectedPlayer {
    pub id: u32,
    pub addr: SocketAddr,
    pub position: Position,
    pub rotation: f64,
    pub weapon: WeaponType,
    pub rolling: bool,
    pub ready: bool,
    pub life: i32,
    pub dead_position: Position,
    pub last_packet: u64,
}

impl ConnectedPlayer {
    pub fn new(id: u32, addr: SocketAddr, timestamp: u64) -> Self {
        Self {
            id,
            addr,
            position: Position::default(),
            rotation: 0.0,
            weapon: WeaponType::Bow,
            rolling: false,
            ready: false,
            life: PLAYER_LIFE,
            dead_position: Position::default(),
            last_packet: timestamp,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0
    }

    /// Applies a client's self report.
    pub fn apply_update(&mut self, update: &PlayerUpdate, timestamp: u64) {
        if self.is_alive() {
            self.dead_position = update.position;
        }
        self.position = update.position;
        self.rotation = update.rotation;
        self.weapon = update.weapon;
        self.rolling = update.rolling;
        self.life = update.life.clamp(0, PLAYER_LIFE);
        self.last_packet = timestamp;
    }

    pub fn take_damage(&mut self, damage: i32) {
        self.life = (self.life - damage).clamp(0, PLAYER_LIFE);
    }

    /// Where enemies chasing this player should walk.
    pub fn chase_position(&self) -> Position {
        if self.is_alive() {
            self.position
        } else {
            self.dead_position
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> ConnectedPlayer {
        ConnectedPlayer::new(1, "127.0.0.1:9000".parse().unwrap(), 100)
    }

    fn update(x: f64, life: i32) -> PlayerUpdate {
        PlayerUpdate {
            position: Position::new(x, 0.0),
            rotation: 0.0,
            weapon: WeaponType::Gun,
            rolling: false,
            life,
        }
    }

    #[test]
    fn test_new_player_is_alive_and_not_ready() {
        let p = player();
        assert!(p.is_alive());
        assert!(!p.ready);
        assert_eq!(p.life, PLAYER_LIFE);
        assert_eq!(p.last_packet, 100);
    }

    #[test]
    fn test_update_clamps_life() {
        let mut p = player();
        p.apply_update(&update(1.0, 99), 200);
        assert_eq!(p.life, PLAYER_LIFE);

        p.apply_update(&update(1.0, -5), 300);
        assert_eq!(p.life, 0);
        assert_eq!(p.last_packet, 300);
        assert_eq!(p.weapon, WeaponType::Gun);
    }

    #[test]
    fn test_dead_position_freezes_when_downed() {
        let mut p = player();
        p.apply_update(&update(10.0, 0), 200);
        assert_eq!(p.dead_position, Position::new(10.0, 0.0));

        p.apply_update(&update(50.0, 0), 300);
        assert_eq!(p.position, Position::new(50.0, 0.0));
        assert_eq!(p.dead_position, Position::new(10.0, 0.0));
        assert_eq!(p.chase_position(), Position::new(10.0, 0.0));
    }

    #[test]
    fn test_take_damage_never_goes_negative() {
        let mut p = player();
        p.take_damage(4);
        assert_eq!(p.life, PLAYER_LIFE - 4);
        p.take_damage(100);
        assert_eq!(p.life, 0);
        assert!(!p.is_alive());
    }
}
