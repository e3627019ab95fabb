use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::net::SocketAddr;

use crate::level::ObstacleGrid;
use crate::modifier::{ModifierStat, Modifiers};
use crate::pathfinding::find_path;
use crate::{Position, SPAWN_IDLE_TIME_FRAMES};

/// Distance at which an enemy considers a waypoint reached.
pub const WAYPOINT_REACHED_DISTANCE: f64 = 20.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterType {
    Zombie,
}

impl CharacterType {
    pub fn base_life(self) -> i32 {
        match self {
            CharacterType::Zombie => 13,
        }
    }

    /// Damage dealt to a player on contact.
    pub fn contact_damage(self) -> i32 {
        match self {
            CharacterType::Zombie => 2,
        }
    }

    pub fn base_speed(self) -> f64 {
        match self {
            CharacterType::Zombie => 1.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Enemy {
    pub character: CharacterType,
    pub position: Position,
    /// Animation counter, grows while moving and decays while standing.
    pub move_duration: u32,
    /// Frames since spawn.
    pub lifetime: u32,
    pub life: i32,
    /// Address of the player being chased. Resolved by lookup every tick.
    pub target: SocketAddr,
    pub path: VecDeque<Position>,
    pub speed: f64,
}

impl Enemy {
    /// Spawns an enemy with life and speed scaled by the monster modifiers.
    pub fn spawn(
        character: CharacterType,
        position: Position,
        target: SocketAddr,
        modifiers: &Modifiers,
    ) -> Self {
        let life = f64::from(character.base_life()) * modifiers.monster_value(ModifierStat::Life);
        Self {
            character,
            position,
            move_duration: 0,
            lifetime: 0,
            life: life.round() as i32,
            target,
            path: VecDeque::new(),
            speed: character.base_speed() * modifiers.monster_value(ModifierStat::Speed),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0
    }

    /// Still showing its spawn marker.
    pub fn is_idle(&self) -> bool {
        self.lifetime <= SPAWN_IDLE_TIME_FRAMES
    }

    pub fn take_damage(&mut self, damage: i32) {
        self.life = (self.life - damage).max(0);
    }

    /// Re-paths toward `goal`. Keeps the current path when none is found.
    pub fn retarget(&mut self, goal: Position, obstacles: &ObstacleGrid) -> bool {
        match find_path(self.position, goal, obstacles) {
            Some(path) => {
                self.path = path.into();
                true
            }
            None => false,
        }
    }

    /// Advances one frame along the current path.
    pub fn step(&mut self) {
        self.lifetime = self.lifetime.saturating_add(1);
        if self.is_idle() {
            return;
        }

        let initial = self.position;

        if self.path.len() > 1
            && self
                .path
                .front()
                .map_or(false, |w| self.position.distance(w) < WAYPOINT_REACHED_DISTANCE)
        {
            self.path.pop_front();
        }

        if let Some(waypoint) = self.path.front() {
            let dx = waypoint.x - self.position.x;
            let dy = waypoint.y - self.position.y;
            self.position.x += dx.clamp(-self.speed, self.speed);
            self.position.y += dy.clamp(-self.speed, self.speed);
        }

        if self.position == initial {
            self.move_duration = (self.move_duration % 30).saturating_sub(1);
        } else {
            self.move_duration += 1;
        }
    }
}
