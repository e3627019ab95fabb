use serde::{Deserialize, Serialize};

use crate::{Position, BULLET_GRACE_PERIOD};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WeaponType {
    #[default]
    Bow,
    Revolver,
    Gun,
}

impl WeaponType {
    pub const ALL: [WeaponType; 3] = [WeaponType::Bow, WeaponType::Revolver, WeaponType::Gun];

    pub fn damage(self) -> i32 {
        match self {
            WeaponType::Bow => 3,
            WeaponType::Revolver | WeaponType::Gun => 2,
        }
    }

    pub fn speed(self) -> f64 {
        match self {
            WeaponType::Bow => 3.0,
            WeaponType::Revolver | WeaponType::Gun => 2.0,
        }
    }

    /// Seconds between shots, before fire-rate modifiers.
    pub fn cooldown(self) -> f64 {
        match self {
            WeaponType::Bow => 2.25,
            WeaponType::Revolver | WeaponType::Gun => 2.0,
        }
    }

    pub fn friendly_fire(self) -> bool {
        false
    }

    /// Arrows stick in walls instead of vanishing.
    pub fn leaves_debris(self) -> bool {
        matches!(self, WeaponType::Bow)
    }

    /// Next weapon in the cycle, used by the weapon-switch intent.
    pub fn next(self) -> Self {
        match self {
            WeaponType::Bow => WeaponType::Revolver,
            WeaponType::Revolver => WeaponType::Gun,
            WeaponType::Gun => WeaponType::Bow,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Bullet {
    pub position: Position,
    /// Radians.
    pub rotation: f64,
    pub weapon: WeaponType,
    pub speed: f64,
    /// Seconds left before the bullet can hit its own side.
    pub grace_period: f64,
    pub hurts_player: bool,
}

impl Bullet {
    /// A bullet fired by a player.
    pub fn fire(position: Position, rotation: f64, weapon: WeaponType) -> Self {
        Self {
            position,
            rotation,
            weapon,
            speed: weapon.speed(),
            grace_period: BULLET_GRACE_PERIOD,
            hurts_player: weapon.friendly_fire(),
        }
    }

    /// Moves the bullet one tick along its heading.
    pub fn advance(&mut self) {
        self.position.x += self.rotation.cos() * self.speed;
        self.position.y += self.rotation.sin() * self.speed;
    }
}
