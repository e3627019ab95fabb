//! # Shared Game Library
//!
//! Types and pure logic used by every process in the game: the mediation
//! service, the authoritative server and the client. Nothing in this crate
//! touches a socket; it only describes what travels over one and how the
//! world behaves between packets.
//!
//! ## Module Organization
//!
//! - [`packet`]: wire header framing, validation and the typed [`Payload`]
//!   sum that rides behind the header.
//! - [`round`]: the round state broadcast by the server on every transition.
//! - [`modifier`]: additive/multiplicative stat modifiers and boons.
//! - [`weapon`]: weapon stats and bullets.
//! - [`enemy`]: enemy characters and their path following.
//! - [`level`]: tile levels, collision geometry and the obstacle matrix.
//! - [`pathfinding`]: grid A* used by enemy AI.
//! - [`player`]: the per-connection player record the server broadcasts.

pub mod enemy;
pub mod level;
pub mod modifier;
pub mod packet;
pub mod pathfinding;
pub mod player;
pub mod round;
pub mod weapon;

pub use enemy::{CharacterType, Enemy};
pub use level::{BuiltinLevels, Level, LevelError, LevelId, LevelSource, ObstacleGrid, Rect, Tile};
pub use modifier::{Boon, Modifier, ModifierCalc, ModifierStat, Modifiers};
pub use packet::{
    Event, EventKind, Handshake, HitInfo, Packet, PacketError, PacketHeader, PacketType, Payload,
    PlayerUpdate, Rendezvous,
};
pub use player::ConnectedPlayer;
pub use round::{RoundContext, RoundPhase, RoundState};
pub use weapon::{Bullet, WeaponType};

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const MEDIATION_PORT: u16 = 8080;
pub const SERVER_PORT: u16 = 8081;

pub const TILE_SIZE: f64 = 16.0;
pub const BULLET_SIZE: f64 = 4.0;
pub const PLAYER_LIFE: i32 = 10;
pub const PLAYER_SPEED: f64 = 2.0;
pub const ROLL_SPEED: f64 = 4.0;

/// Amount every per-tick countdown (grace periods, cooldowns) shrinks by.
pub const TICK_DECAY: f64 = 0.16;

/// Frames an enemy stands still after spawning, while its spawn marker shows.
pub const SPAWN_IDLE_TIME_FRAMES: u32 = 60;

/// Seconds a freshly fired bullet ignores its own side.
pub const BULLET_GRACE_PERIOD: f64 = 1.5;

/// Seconds a player is immune to further contact damage after being touched.
pub const CONTACT_GRACE_PERIOD: f64 = 2.0;

/// A point in world space, in pixels. Entities are anchored at their top-left corner.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned overlap between two boxes anchored at their top-left corners.
pub fn boxes_overlap(a: Position, a_size: f64, b: Position, b_size: f64) -> bool {
    a.x < b.x + b_size && a.x + a_size > b.x && a.y < b.y + b_size && a.y + a_size > b.y
}

/// Milliseconds since the unix epoch.
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert_approx_eq!(a.distance(&b), 5.0);
        assert_approx_eq!(b.distance(&a), 5.0);
    }

    #[test]
    fn test_boxes_overlap() {
        let a = Position::new(0.0, 0.0);
        assert!(boxes_overlap(a, TILE_SIZE, Position::new(8.0, 8.0), TILE_SIZE));
        assert!(!boxes_overlap(a, TILE_SIZE, Position::new(TILE_SIZE, 0.0), TILE_SIZE));
        assert!(boxes_overlap(
            Position::new(14.0, 2.0),
            BULLET_SIZE,
            a,
            TILE_SIZE
        ));
    }

    #[test]
    fn test_get_timestamp_is_monotonic_enough() {
        let t1 = get_timestamp();
        std::thread::sleep(Duration::from_millis(2));
        let t2 = get_timestamp();
        assert!(t2 > t1);
    }
}
