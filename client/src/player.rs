use shared::{
    Bullet, Level, ModifierStat, Modifiers, PlayerUpdate, Position, WeaponType,
    CONTACT_GRACE_PERIOD, PLAYER_LIFE, PLAYER_SPEED, ROLL_SPEED, TICK_DECAY, TILE_SIZE,
};

/// How long a roll lasts, in the same units as the other countdowns
pub const ROLL_DURATION: f64 = 1.0;

/// The player this client controls
///
/// Movement is simulated locally and reported to the server, which only
/// keeps the latest report. Life is the exception: it changes only when the
/// server broadcasts a hit.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub position: Position,
    /// Aim, in radians
    pub rotation: f64,
    pub weapon: WeaponType,
    pub life: i32,
    pub rolling: bool,
    roll_remaining: f64,
    roll_direction: (f64, f64),
    shoot_cooldown: f64,
    contact_grace: f64,
}

impl LocalPlayer {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            rotation: 0.0,
            weapon: WeaponType::default(),
            life: PLAYER_LIFE,
            rolling: false,
            roll_remaining: 0.0,
            roll_direction: (0.0, 0.0),
            shoot_cooldown: 0.0,
            contact_grace: 0.0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0
    }

    /// Puts the player back at a level's spawn point
    pub fn respawn(&mut self, position: Position) {
        self.position = position;
        self.rolling = false;
        self.roll_remaining = 0.0;
    }

    /// Counts every timer down by one frame
    pub fn tick(&mut self, level: &Level) {
        self.shoot_cooldown = (self.shoot_cooldown - TICK_DECAY).max(0.0);
        self.contact_grace = (self.contact_grace - TICK_DECAY).max(0.0);

        if self.rolling {
            let (dx, dy) = self.roll_direction;
            self.slide(dx * ROLL_SPEED, dy * ROLL_SPEED, level);

            self.roll_remaining = (self.roll_remaining - TICK_DECAY).max(0.0);
            if self.roll_remaining <= 0.0 {
                self.rolling = false;
            }
        }
    }

    /// Walks one frame in `direction`, stopping at walls
    pub fn walk(&mut self, direction: (f64, f64), level: &Level, modifiers: &Modifiers) {
        if !self.is_alive() || self.rolling {
            return;
        }
        let Some((dx, dy)) = normalize(direction) else {
            return;
        };

        let speed = PLAYER_SPEED * modifiers.player_value(ModifierStat::Speed);
        self.slide(dx * speed, dy * speed, level);
    }

    /// Starts a roll in `direction`. Rolling players can't be hit.
    pub fn start_roll(&mut self, direction: (f64, f64)) -> bool {
        if !self.is_alive() || self.rolling {
            return false;
        }
        let Some(direction) = normalize(direction) else {
            return false;
        };

        self.rolling = true;
        self.roll_remaining = ROLL_DURATION;
        self.roll_direction = direction;
        true
    }

    /// Fires the current weapon if it has cooled down
    pub fn try_shoot(&mut self, modifiers: &Modifiers) -> Option<Bullet> {
        if !self.is_alive() || self.shoot_cooldown > 0.0 {
            return None;
        }

        let fire_rate = modifiers.player_value(ModifierStat::FireRate);
        self.shoot_cooldown = self.weapon.cooldown() / fire_rate.max(f64::EPSILON);
        Some(Bullet::fire(self.position, self.rotation, self.weapon))
    }

    pub fn switch_weapon(&mut self) {
        self.weapon = self.weapon.next();
    }

    /// Whether an enemy touching the player right now deals damage.
    /// Starts the grace period when it does.
    pub fn take_contact(&mut self) -> bool {
        if !self.is_alive() || self.rolling || self.contact_grace > 0.0 {
            return false;
        }
        self.contact_grace = CONTACT_GRACE_PERIOD;
        true
    }

    pub fn apply_damage(&mut self, damage: i32) {
        self.life = (self.life - damage).clamp(0, PLAYER_LIFE);
    }

    pub fn update(&self) -> PlayerUpdate {
        PlayerUpdate {
            position: self.position,
            rotation: self.rotation,
            weapon: self.weapon,
            rolling: self.rolling,
            life: self.life,
        }
    }

    /// Moves each axis on its own so the player slides along walls
    fn slide(&mut self, dx: f64, dy: f64, level: &Level) {
        let moved_x = Position::new(self.position.x + dx, self.position.y);
        if !level.collides(moved_x, TILE_SIZE) {
            self.position = moved_x;
        }

        let moved_y = Position::new(self.position.x, self.position.y + dy);
        if !level.collides(moved_y, TILE_SIZE) {
            self.position = moved_y;
        }
    }
}

fn normalize((x, y): (f64, f64)) -> Option<(f64, f64)> {
    let length = (x * x + y * y).sqrt();
    if length == 0.0 || !length.is_finite() {
        return None;
    }
    Some((x / length, y / length))
}
