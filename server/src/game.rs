use log::{debug, info};
use rand::Rng;
use shared::{
    boxes_overlap, Bullet, CharacterType, Enemy, HitInfo, Level, LevelError, LevelId, LevelSource,
    ModifierStat, Modifiers, Position, BULLET_GRACE_PERIOD, BULLET_SIZE, TICK_DECAY, TILE_SIZE,
};

use crate::connections::ConnectionRegistry;

/// Upper bound on the base size of a wave, before modifiers
pub const MAX_SPAWN_COUNT: u32 = 5;
/// Enemies of a wave spawn within this many pixels of its centre
pub const SPAWN_RADIUS: f64 = 120.0;
/// Fraction of life a freshly spawned enemy keeps on the server
pub const SPAWN_LIFE_HANDICAP: f64 = 0.8;

/// Authoritative simulation state owned by the tick loop
pub struct World {
    levels: Box<dyn LevelSource>,
    level: Level,
    bullets: Vec<Bullet>,
    enemies: Vec<Enemy>,
    modifiers: Modifiers,
}

impl World {
    pub fn new(levels: Box<dyn LevelSource>) -> Result<Self, LevelError> {
        let level = levels.load(LevelId::Lobby)?;
        Ok(Self {
            levels,
            level,
            bullets: Vec::new(),
            enemies: Vec::new(),
            modifiers: Modifiers::default(),
        })
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn arena_count(&self) -> u8 {
        self.levels.arena_count()
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    /// Swaps in a new level. Bullets in flight belong to the old one.
    pub fn load_level(&mut self, id: LevelId) -> Result<(), LevelError> {
        self.level = self.levels.load(id)?;
        self.bullets.clear();
        info!("Loaded {}", id);
        Ok(())
    }

    /// Tracks a bullet reported by a client
    pub fn add_bullet(&mut self, mut bullet: Bullet) {
        bullet.grace_period = BULLET_GRACE_PERIOD;
        self.bullets.push(bullet);
    }

    pub fn add_modifiers(&mut self, modifiers: &Modifiers) {
        self.modifiers.add(modifiers);
    }

    /// Drops everything accumulated over a game and goes back to the lobby
    pub fn reset_for_lobby(&mut self) -> Result<(), LevelError> {
        self.enemies.clear();
        self.modifiers.clear();
        self.load_level(LevelId::Lobby)
    }

    /// Moves every bullet one tick and resolves its hits
    ///
    /// Enemies hit by a bullet lose life right away. Players hit by a bullet
    /// that can hurt them are returned for the caller to apply and broadcast.
    pub fn step_bullets(&mut self, players: &ConnectionRegistry) -> Vec<HitInfo> {
        let player_damage = self.modifiers.player_value(ModifierStat::Damage);
        let monster_damage = self.modifiers.monster_value(ModifierStat::Damage);
        let level = &self.level;
        let enemies = &mut self.enemies;
        let mut hits = Vec::new();

        self.bullets.retain_mut(|bullet| {
            bullet.advance();
            bullet.grace_period = (bullet.grace_period - TICK_DECAY).max(0.0);

            let mut spent = false;

            if !bullet.hurts_player {
                let target = enemies.iter_mut().find(|enemy| {
                    enemy.is_alive()
                        && boxes_overlap(bullet.position, BULLET_SIZE, enemy.position, TILE_SIZE)
                });
                if let Some(enemy) = target {
                    let damage = f64::from(bullet.weapon.damage()) * player_damage;
                    enemy.take_damage(damage.round() as i32);
                    spent = true;
                }
            } else if bullet.grace_period <= 0.0 {
                for player in players.iter() {
                    if !boxes_overlap(bullet.position, BULLET_SIZE, player.position, TILE_SIZE) {
                        continue;
                    }
                    if !player.rolling {
                        let damage = f64::from(bullet.weapon.damage()) * monster_damage;
                        hits.push(HitInfo {
                            player: player.addr,
                            damage: damage.round() as i32,
                        });
                    }
                    spent = true;
                }
            }

            let outside = bullet.position.x < 0.0
                || bullet.position.y < 0.0
                || bullet.position.x > level.pixel_width()
                || bullet.position.y > level.pixel_height();

            !(spent || outside || level.collides(bullet.position, BULLET_SIZE))
        });

        hits
    }

    /// Scatters a wave of enemies around a random point of the level
    ///
    /// Returns the wave as it should be broadcast. The copies kept here
    /// start with reduced life, since clients show a spawn marker first.
    pub fn spawn_wave<R: Rng>(&mut self, players: &ConnectionRegistry, rng: &mut R) -> Vec<Enemy> {
        let targets = players.alive_addrs();
        if targets.is_empty() {
            return Vec::new();
        }

        let max_x = (self.level.pixel_width() - TILE_SIZE).max(0.0);
        let max_y = (self.level.pixel_height() - TILE_SIZE).max(0.0);
        let centre = Position::new(rng.gen_range(0.0..=max_x), rng.gen_range(0.0..=max_y));

        let base = rng.gen_range(1..=MAX_SPAWN_COUNT);
        let count = (f64::from(base) * self.modifiers.total_multiplier()).round() as usize;

        let mut wave = Vec::with_capacity(count);
        for _ in 0..count {
            let position = Position::new(
                (centre.x + rng.gen_range(-SPAWN_RADIUS..=SPAWN_RADIUS)).clamp(0.0, max_x),
                (centre.y + rng.gen_range(-SPAWN_RADIUS..=SPAWN_RADIUS)).clamp(0.0, max_y),
            );
            if self.level.check_collision(position).is_some() {
                continue;
            }

            let target = targets[rng.gen_range(0..targets.len())];
            wave.push(Enemy::spawn(
                CharacterType::Zombie,
                position,
                target,
                &self.modifiers,
            ));
        }

        debug!("Spawned {} of {} enemies around {:?}", wave.len(), count, centre);

        self.enemies.extend(wave.iter().cloned().map(|mut enemy| {
            enemy.life = (f64::from(enemy.life) * SPAWN_LIFE_HANDICAP) as i32;
            enemy
        }));

        wave
    }

    /// Re-paths every enemy toward its target and moves it one step
    pub fn step_enemies(&mut self, players: &ConnectionRegistry) {
        let obstacles = &self.level.obstacles;

        for enemy in &mut self.enemies {
            match players.get(&enemy.target) {
                Some(target) => {
                    enemy.retarget(target.chase_position(), obstacles);
                }
                None => debug!("Enemy target {} is no longer connected", enemy.target),
            }
            enemy.step();
        }

        self.enemies.retain(Enemy::is_alive);
    }

    pub fn enemies_alive(&self) -> usize {
        self.enemies.iter().filter(|e| e.is_alive()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{
        BuiltinLevels, Modifier, ModifierCalc, PlayerUpdate, WeaponType, PLAYER_LIFE,
        SPAWN_IDLE_TIME_FRAMES,
    };
    use std::net::SocketAddr;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9001".parse().unwrap()
    }

    fn world() -> World {
        World::new(Box::new(BuiltinLevels)).unwrap()
    }

    /// A registry with one player standing at `position`
    fn players_at(position: Position) -> ConnectionRegistry {
        let mut players = ConnectionRegistry::new();
        players.add(test_addr(), 0);
        players.apply_update(
            &test_addr(),
            &PlayerUpdate {
                position,
                rotation: 0.0,
                weapon: WeaponType::Bow,
                rolling: false,
                life: PLAYER_LIFE,
            },
            0,
        );
        players
    }

    fn open_floor(world: &World) -> Position {
        world.level().spawn
    }

    fn enemy_at(position: Position) -> Enemy {
        Enemy::spawn(CharacterType::Zombie, position, test_addr(), &Modifiers::default())
    }

    #[test]
    fn test_world_starts_in_lobby() {
        let world = world();
        assert_eq!(world.level().id, LevelId::Lobby);
        assert!(world.bullets().is_empty());
        assert!(world.enemies().is_empty());
        assert!(world.modifiers().is_empty());
    }

    #[test]
    fn test_unknown_level_is_an_error() {
        let mut world = world();
        let err = world.load_level(LevelId::Arena(99)).unwrap_err();
        assert_eq!(err, LevelError::UnknownLevel(LevelId::Arena(99)));
        assert_eq!(world.level().id, LevelId::Lobby);
    }

    #[test]
    fn test_bullet_hits_enemy() {
        let mut world = world();
        let spawn = open_floor(&world);
        world.enemies.push(enemy_at(Position::new(spawn.x + 4.0, spawn.y)));
        world.add_bullet(Bullet::fire(spawn, 0.0, WeaponType::Bow));

        let hits = world.step_bullets(&ConnectionRegistry::new());
        assert!(hits.is_empty());
        assert!(world.bullets().is_empty());
        assert_eq!(world.enemies()[0].life, 13 - 3);
    }

    #[test]
    fn test_player_damage_modifier_scales_bullets() {
        let mut world = world();
        world.add_modifiers(&Modifiers {
            monster: Vec::new(),
            player: vec![Modifier::new(ModifierCalc::Multiplicative, ModifierStat::Damage, 1.0)],
        });
        let spawn = open_floor(&world);
        world.enemies.push(enemy_at(Position::new(spawn.x + 4.0, spawn.y)));
        world.add_bullet(Bullet::fire(spawn, 0.0, WeaponType::Revolver));

        world.step_bullets(&ConnectionRegistry::new());
        assert_eq!(world.enemies()[0].life, 13 - 4);
    }

    #[test]
    fn test_bullet_removed_on_wall() {
        let mut world = world();
        // one step left of the first floor tile lands inside the outer wall
        world.add_bullet(Bullet::fire(
            Position::new(TILE_SIZE + 1.0, TILE_SIZE + 1.0),
            std::f64::consts::PI,
            WeaponType::Gun,
        ));

        world.step_bullets(&ConnectionRegistry::new());
        assert!(world.bullets().is_empty());
    }

    #[test]
    fn test_hostile_bullet_respects_grace_and_roll() {
        let mut world = world();
        let spawn = open_floor(&world);
        let mut players = players_at(Position::new(spawn.x + 2.0, spawn.y));

        let mut bullet = Bullet::fire(spawn, 0.0, WeaponType::Gun);
        bullet.hurts_player = true;
        bullet.speed = 0.0;
        world.add_bullet(bullet);

        // grace period still running
        assert!(world.step_bullets(&players).is_empty());
        assert_eq!(world.bullets().len(), 1);

        world.bullets[0].grace_period = 0.0;
        players.set_rolling(&test_addr());
        assert!(world.step_bullets(&players).is_empty());
        assert!(world.bullets().is_empty());

        let players = players_at(Position::new(spawn.x + 2.0, spawn.y));
        world.add_bullet(bullet);
        world.bullets[0].grace_period = 0.0;
        let hits = world.step_bullets(&players);
        assert_eq!(
            hits,
            vec![HitInfo {
                player: test_addr(),
                damage: 2
            }]
        );
    }

    #[test]
    fn test_spawn_wave_targets_alive_players() {
        let mut world = world();
        world.load_level(LevelId::Arena(1)).unwrap();
        let players = players_at(open_floor(&world));
        let mut rng = StdRng::seed_from_u64(42);

        let mut total = 0;
        for _ in 0..10 {
            let wave = world.spawn_wave(&players, &mut rng);
            for enemy in &wave {
                assert_eq!(enemy.target, test_addr());
                assert!(world.level().check_collision(enemy.position).is_none());
                assert_eq!(enemy.life, 13);
            }
            total += wave.len();
        }

        assert!(total > 0);
        assert_eq!(world.enemies().len(), total);
        assert!(world.enemies().iter().all(|enemy| enemy.life == 10));
    }

    #[test]
    fn test_spawn_wave_without_players() {
        let mut world = world();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(world
            .spawn_wave(&ConnectionRegistry::new(), &mut rng)
            .is_empty());
        assert!(world.enemies().is_empty());
    }

    #[test]
    fn test_enemies_chase_and_dead_are_removed() {
        let mut world = world();
        let spawn = open_floor(&world);
        let players = players_at(Position::new(spawn.x + 5.0 * TILE_SIZE, spawn.y));

        let mut chaser = enemy_at(spawn);
        chaser.lifetime = SPAWN_IDLE_TIME_FRAMES;
        let mut dead = enemy_at(spawn);
        dead.life = 0;
        world.enemies = vec![chaser, dead];

        world.step_enemies(&players);
        assert_eq!(world.enemies().len(), 1);
        assert!(!world.enemies()[0].path.is_empty());
        assert!(world.enemies()[0].position.x > spawn.x);
    }

    #[test]
    fn test_enemy_with_missing_target_keeps_path() {
        let mut world = world();
        let spawn = open_floor(&world);
        let mut enemy = enemy_at(spawn);
        enemy.path.push_back(Position::new(spawn.x + TILE_SIZE, spawn.y));
        world.enemies = vec![enemy];

        world.step_enemies(&ConnectionRegistry::new());
        assert_eq!(world.enemies()[0].path.len(), 1);
    }

    #[test]
    fn test_reset_for_lobby() {
        let mut world = world();
        world.load_level(LevelId::Arena(2)).unwrap();
        world.enemies.push(enemy_at(open_floor(&world)));
        world.add_modifiers(&Modifiers {
            monster: vec![Modifier::new(ModifierCalc::Additive, ModifierStat::Life, 0.1)],
            player: Vec::new(),
        });

        world.reset_for_lobby().unwrap();
        assert_eq!(world.level().id, LevelId::Lobby);
        assert!(world.enemies().is_empty());
        assert!(world.modifiers().is_empty());
    }
}
