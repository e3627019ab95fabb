use log::{debug, error, info};
use shared::{
    boxes_overlap, Boon, Bullet, ConnectedPlayer, Enemy, Event, EventKind, Handshake, HitInfo,
    Level, LevelError, LevelId, LevelSource, ModifierStat, Modifiers, Payload, PlayerUpdate,
    Position, RoundPhase, RoundState, BULLET_SIZE, PLAYER_LIFE, TICK_DECAY, TILE_SIZE,
};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::config::ClientConfig;
use crate::input::{HeldInput, Intent};
use crate::interpolation::PlayerState;
use crate::player::LocalPlayer;

/// Things the UI may want to react to, derived from server broadcasts
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    LevelChanged(LevelId),
    EnemiesSpawned(Vec<Enemy>),
    BoonSpawned(Vec<Boon>),
    PlayerDied(SocketAddr),
    RoundStateChanged(RoundState),
    GameOver,
    PrepareNewLevel,
}

/// What a frame wants sent to the host
#[derive(Debug, Default, PartialEq)]
pub struct FrameOutput {
    pub position: Option<PlayerUpdate>,
    /// Enemy contact damage taken by the local player
    pub hits: Vec<HitInfo>,
}

/// Everything this client knows about the session
///
/// The network loop is the only writer. Renderers read it through a shared
/// lock and should treat it as a snapshot.
pub struct ClientWorld {
    levels: Box<dyn LevelSource>,
    pub level: Level,
    pub player_id: Option<u32>,
    /// Our address as the host sees it
    pub self_addr: Option<SocketAddr>,
    pub local: LocalPlayer,
    /// Everyone in the last player list, ourselves included
    pub players: HashMap<SocketAddr, PlayerState>,
    pub bullets: Vec<Bullet>,
    /// Arrows stuck in walls
    pub debris: Vec<Bullet>,
    pub enemies: Vec<Enemy>,
    pub boons: Vec<Boon>,
    pub round: RoundState,
    pub modifiers: Modifiers,
    held: HeldInput,
    frame: u64,
    interpolation_frames: u32,
    position_send_every: u32,
}

impl ClientWorld {
    pub fn new(levels: Box<dyn LevelSource>, config: &ClientConfig) -> Result<Self, LevelError> {
        let level = levels.load(LevelId::Lobby)?;
        let local = LocalPlayer::new(level.spawn);

        Ok(Self {
            levels,
            level,
            player_id: None,
            self_addr: None,
            local,
            players: HashMap::new(),
            bullets: Vec::new(),
            debris: Vec::new(),
            enemies: Vec::new(),
            boons: Vec::new(),
            round: RoundState::waiting_room(),
            modifiers: Modifiers::default(),
            held: HeldInput::default(),
            frame: 0,
            interpolation_frames: config.interpolation_frames,
            position_send_every: config.position_send_every.max(1),
        })
    }

    pub fn set_identity(&mut self, handshake: &Handshake) {
        self.player_id = Some(handshake.player_id);
        if handshake.observed_addr.is_some() {
            self.self_addr = handshake.observed_addr;
        }
        info!(
            "Joined as player {} ({:?})",
            handshake.player_id, handshake.observed_addr
        );
    }

    pub fn is_self(&self, addr: SocketAddr) -> bool {
        self.self_addr == Some(addr)
    }

    /// Remote players with their interpolated draw positions
    pub fn remote_players(&self) -> Vec<(&ConnectedPlayer, Position)> {
        self.players
            .values()
            .filter(|state| !self.is_self(state.connection.addr))
            .map(|state| (&state.connection, state.position(self.interpolation_frames)))
            .collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn ready_count(&self) -> usize {
        self.players.values().filter(|s| s.connection.ready).count()
    }

    /// Takes a fresh player list from the host. Players missing from it are
    /// gone.
    pub fn apply_player_list(&mut self, list: Vec<ConnectedPlayer>) {
        let mut next = HashMap::with_capacity(list.len());
        for connection in list {
            let addr = connection.addr;
            let state = match self.players.remove(&addr) {
                Some(mut state) => {
                    state.apply(connection);
                    state
                }
                None => PlayerState::new(connection),
            };
            next.insert(addr, state);
        }
        self.players = next;
    }

    pub fn add_bullet(&mut self, bullet: Bullet) {
        self.bullets.push(bullet);
    }

    /// Applies a hit broadcast by the host
    pub fn apply_hit(&mut self, hit: &HitInfo) -> Option<ClientEvent> {
        let life_before = if self.is_self(hit.player) {
            let life = self.local.life;
            self.local.apply_damage(hit.damage);
            Some(life)
        } else {
            self.players.get_mut(&hit.player).map(|state| {
                let life = state.connection.life;
                state.connection.take_damage(hit.damage);
                life
            })
        };

        match life_before {
            Some(life) if life > 0 && life - hit.damage < 1 => {
                info!("Player at {} died", hit.player);
                Some(ClientEvent::PlayerDied(hit.player))
            }
            _ => None,
        }
    }

    /// Follows a round state change and returns the events it implies
    pub fn apply_round_state(&mut self, state: RoundState) -> Vec<ClientEvent> {
        let mut events = vec![ClientEvent::RoundStateChanged(state.clone())];

        match state.phase {
            RoundPhase::WaitingRoom => {
                if self.level.id != state.context.level {
                    self.enter_level(state.context.level);
                }
                self.local.life = PLAYER_LIFE;
                events.push(ClientEvent::LevelChanged(state.context.level));
            }
            RoundPhase::Starting => events.push(ClientEvent::PrepareNewLevel),
            RoundPhase::Playing => {
                self.enter_level(state.context.level);
                events.push(ClientEvent::LevelChanged(state.context.level));
            }
            RoundPhase::LevelCompleted => {
                self.boons = place_boons(self.level.spawn, &state.context.modifier_options);
                events.push(ClientEvent::BoonSpawned(self.boons.clone()));
            }
            RoundPhase::GameOver => events.push(ClientEvent::GameOver),
        }

        self.round = state;
        events
    }

    pub fn apply_server_event(&mut self, event: Event) -> Option<ClientEvent> {
        match event.kind {
            EventKind::SpawnEnemies => {
                debug!("{} enemies spawned", event.enemies.len());
                self.enemies.extend(event.enemies.iter().cloned());
                Some(ClientEvent::EnemiesSpawned(event.enemies))
            }
            EventKind::NewLevel => {
                self.enter_level(event.level);
                Some(ClientEvent::LevelChanged(event.level))
            }
            EventKind::SpawnBoon => {
                self.boons = place_boons(self.level.spawn, &event.modifiers);
                Some(ClientEvent::BoonSpawned(self.boons.clone()))
            }
            EventKind::PrepareNewLevel => Some(ClientEvent::PrepareNewLevel),
            EventKind::GameOver => Some(ClientEvent::GameOver),
            // deaths are derived from hit broadcasts
            EventKind::PlayerDied => None,
        }
    }

    /// Applies a player intent. Returns the packet it produces, if any.
    pub fn apply_intent(&mut self, intent: &Intent) -> Option<Payload> {
        if self.held.apply(intent) {
            return None;
        }

        match intent {
            Intent::Aim(rotation) => {
                self.local.rotation = *rotation;
                None
            }
            Intent::SwitchWeapon => {
                self.local.switch_weapon();
                None
            }
            Intent::Shoot => self.local.try_shoot(&self.modifiers).map(Payload::BulletStart),
            Intent::Roll => {
                let direction = if self.held.is_moving() {
                    self.held.direction
                } else {
                    (self.local.rotation.cos(), self.local.rotation.sin())
                };
                self.local
                    .start_roll(direction)
                    .then_some(Payload::PlayerRoll)
            }
            Intent::ToggleReady => Some(Payload::ClientToggleReady),
            Intent::PickModifier => {
                if self.round.phase != RoundPhase::LevelCompleted {
                    return None;
                }
                let position = self.local.position;
                let boon = self
                    .boons
                    .iter()
                    .filter(|boon| boon.in_range(&position))
                    .min_by(|a, b| {
                        a.position
                            .distance(&position)
                            .total_cmp(&b.position.distance(&position))
                    })?;
                let chosen = boon.modifiers.clone();
                self.boons.clear();
                Some(Payload::ModifierChosen(chosen))
            }
            Intent::Move(_) | Intent::Quit => None,
        }
    }

    /// Advances the local simulation by one frame
    pub fn frame(&mut self) -> FrameOutput {
        self.frame += 1;

        self.local
            .walk(self.held.direction, &self.level, &self.modifiers);
        self.local.tick(&self.level);

        for state in self.players.values_mut() {
            state.advance_frame();
        }

        self.step_bullets();
        let hits = self.step_enemies();

        let position = (self.frame % u64::from(self.position_send_every) == 0)
            .then(|| self.local.update());

        FrameOutput { position, hits }
    }

    fn enter_level(&mut self, id: LevelId) {
        if self.level.id != id {
            match self.levels.load(id) {
                Ok(level) => self.level = level,
                Err(e) => error!("Failed to load {}: {}", id, e),
            }
        }

        self.bullets.clear();
        self.debris.clear();
        self.enemies.clear();
        self.boons.clear();
        self.local.respawn(self.level.spawn);
    }

    fn step_bullets(&mut self) {
        let player_damage = self.modifiers.player_value(ModifierStat::Damage);
        let level = &self.level;
        let enemies = &mut self.enemies;
        let debris = &mut self.debris;

        self.bullets.retain_mut(|bullet| {
            bullet.advance();
            bullet.grace_period = (bullet.grace_period - TICK_DECAY).max(0.0);

            if level.collides(bullet.position, BULLET_SIZE) {
                if bullet.weapon.leaves_debris() {
                    debris.push(*bullet);
                }
                return false;
            }

            if !bullet.hurts_player {
                let target = enemies.iter_mut().find(|enemy| {
                    enemy.is_alive()
                        && boxes_overlap(bullet.position, BULLET_SIZE, enemy.position, TILE_SIZE)
                });
                if let Some(enemy) = target {
                    let damage = f64::from(bullet.weapon.damage()) * player_damage;
                    enemy.take_damage(damage.round() as i32);
                    return false;
                }
            }

            bullet.position.x >= 0.0
                && bullet.position.y >= 0.0
                && bullet.position.x <= level.pixel_width()
                && bullet.position.y <= level.pixel_height()
        });

        self.enemies.retain(Enemy::is_alive);
    }

    fn step_enemies(&mut self) -> Vec<HitInfo> {
        let monster_damage = self.modifiers.monster_value(ModifierStat::Damage);
        let obstacles = &self.level.obstacles;
        let mut hits = Vec::new();

        for enemy in &mut self.enemies {
            let goal = if self.self_addr == Some(enemy.target) {
                Some(self.local.position)
            } else {
                self.players.get(&enemy.target).map(|state| {
                    if state.connection.is_alive() {
                        state.position(self.interpolation_frames)
                    } else {
                        state.connection.dead_position
                    }
                })
            };
            if let Some(goal) = goal {
                enemy.retarget(goal, obstacles);
            }
            enemy.step();

            let Some(self_addr) = self.self_addr else {
                continue;
            };
            if !enemy.is_idle()
                && boxes_overlap(enemy.position, TILE_SIZE, self.local.position, TILE_SIZE)
                && self.local.take_contact()
            {
                let damage = f64::from(enemy.character.contact_damage()) * monster_damage;
                hits.push(HitInfo {
                    player: self_addr,
                    damage: damage.round() as i32,
                });
            }
        }

        hits
    }
}

/// Lays the offered options out side by side around the spawn point
fn place_boons(spawn: Position, options: &[Modifiers]) -> Vec<Boon> {
    let centre = (options.len() as f64 - 1.0) / 2.0;
    options
        .iter()
        .enumerate()
        .map(|(i, modifiers)| {
            let offset = (i as f64 - centre) * 2.0 * TILE_SIZE;
            Boon::new(
                Position::new(spawn.x + offset, spawn.y),
                modifiers.clone(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        BuiltinLevels, CharacterType, Modifier, ModifierCalc, RoundContext, WeaponType,
        SPAWN_IDLE_TIME_FRAMES,
    };

    fn self_addr() -> SocketAddr {
        "127.0.0.1:9200".parse().unwrap()
    }

    fn other_addr() -> SocketAddr {
        "127.0.0.1:9201".parse().unwrap()
    }

    fn world() -> ClientWorld {
        let mut world = ClientWorld::new(Box::new(BuiltinLevels), &ClientConfig::default()).unwrap();
        world.set_identity(&Handshake {
            player_id: 1,
            observed_addr: Some(self_addr()),
        });
        world
    }

    fn state(phase: RoundPhase, context: RoundContext) -> RoundState {
        RoundState { phase, context }
    }

    fn options() -> Vec<Modifiers> {
        vec![
            Modifiers {
                monster: vec![Modifier::new(ModifierCalc::Additive, ModifierStat::Life, 0.1)],
                player: vec![Modifier::new(ModifierCalc::Additive, ModifierStat::Damage, 0.1)],
            },
            Modifiers {
                monster: vec![Modifier::new(ModifierCalc::Multiplicative, ModifierStat::Speed, 0.1)],
                player: vec![Modifier::new(
                    ModifierCalc::Multiplicative,
                    ModifierStat::FireRate,
                    0.1,
                )],
            },
        ]
    }

    #[test]
    fn test_player_list_replaces_missing_players() {
        let mut world = world();
        world.apply_player_list(vec![
            ConnectedPlayer::new(1, self_addr(), 0),
            ConnectedPlayer::new(2, other_addr(), 0),
        ]);
        assert_eq!(world.player_count(), 2);
        assert_eq!(world.remote_players().len(), 1);

        world.apply_player_list(vec![ConnectedPlayer::new(1, self_addr(), 0)]);
        assert_eq!(world.player_count(), 1);
        assert!(world.remote_players().is_empty());
    }

    #[test]
    fn test_remote_player_is_interpolated() {
        let mut world = world();
        world.apply_player_list(vec![ConnectedPlayer::new(2, other_addr(), 0)]);

        let mut moved = ConnectedPlayer::new(2, other_addr(), 0);
        moved.position = Position::new(60.0, 0.0);
        world.apply_player_list(vec![moved]);

        for _ in 0..3 {
            world.frame();
        }
        let (_, position) = world.remote_players()[0];
        assert_eq!(position, Position::new(30.0, 0.0));
    }

    #[test]
    fn test_hit_on_self_reduces_life_and_reports_death() {
        let mut world = world();

        let hit = HitInfo {
            player: self_addr(),
            damage: 4,
        };
        assert_eq!(world.apply_hit(&hit), None);
        assert_eq!(world.local.life, PLAYER_LIFE - 4);

        let fatal = HitInfo {
            player: self_addr(),
            damage: 20,
        };
        assert_eq!(
            world.apply_hit(&fatal),
            Some(ClientEvent::PlayerDied(self_addr()))
        );
        assert_eq!(world.local.life, 0);
        assert_eq!(world.apply_hit(&fatal), None);
    }

    #[test]
    fn test_playing_loads_level() {
        let mut world = world();
        let context = RoundContext {
            level: LevelId::Arena(2),
            ..RoundContext::default()
        };

        let events = world.apply_round_state(state(RoundPhase::Playing, context));
        assert!(matches!(events[0], ClientEvent::RoundStateChanged(_)));
        assert_eq!(events[1], ClientEvent::LevelChanged(LevelId::Arena(2)));
        assert_eq!(world.level.id, LevelId::Arena(2));
        assert_eq!(world.local.position, world.level.spawn);
    }

    #[test]
    fn test_waiting_room_restores_life() {
        let mut world = world();
        world.local.apply_damage(7);

        let events = world.apply_round_state(RoundState::waiting_room());
        assert!(events.contains(&ClientEvent::LevelChanged(LevelId::Lobby)));
        assert_eq!(world.local.life, PLAYER_LIFE);
    }

    #[test]
    fn test_level_completed_spawns_boons_and_pick_sends_choice() {
        let mut world = world();
        let context = RoundContext {
            modifier_options: options(),
            ..RoundContext::default()
        };

        let events = world.apply_round_state(state(RoundPhase::LevelCompleted, context));
        match &events[1] {
            ClientEvent::BoonSpawned(boons) => assert_eq!(boons.len(), 2),
            other => panic!("expected boons, got {:?}", other),
        }

        world.local.position = world.boons[1].position;
        let payload = world.apply_intent(&Intent::PickModifier);
        assert_eq!(payload, Some(Payload::ModifierChosen(options()[1].clone())));
        assert!(world.boons.is_empty());
        assert_eq!(world.apply_intent(&Intent::PickModifier), None);
    }

    #[test]
    fn test_pick_out_of_range_sends_nothing() {
        let mut world = world();
        let context = RoundContext {
            modifier_options: options(),
            ..RoundContext::default()
        };
        world.apply_round_state(state(RoundPhase::LevelCompleted, context));

        world.local.position = Position::new(world.level.spawn.x, world.level.spawn.y + 100.0);
        assert_eq!(world.apply_intent(&Intent::PickModifier), None);
        assert_eq!(world.boons.len(), 2);
    }

    #[test]
    fn test_intents() {
        let mut world = world();

        assert_eq!(world.apply_intent(&Intent::Move((1.0, 0.0))), None);
        assert_eq!(world.apply_intent(&Intent::Aim(1.5)), None);
        assert_eq!(world.local.rotation, 1.5);

        assert!(matches!(
            world.apply_intent(&Intent::Shoot),
            Some(Payload::BulletStart(_))
        ));
        assert_eq!(world.apply_intent(&Intent::Shoot), None);

        assert_eq!(world.apply_intent(&Intent::Roll), Some(Payload::PlayerRoll));
        assert_eq!(
            world.apply_intent(&Intent::ToggleReady),
            Some(Payload::ClientToggleReady)
        );

        world.apply_intent(&Intent::SwitchWeapon);
        assert_eq!(world.local.weapon, WeaponType::Revolver);
    }

    #[test]
    fn test_position_sent_every_third_frame() {
        let mut world = world();
        assert!(world.frame().position.is_none());
        assert!(world.frame().position.is_none());
        assert_eq!(world.frame().position, Some(world.local.update()));
    }

    #[test]
    fn test_arrow_leaves_debris() {
        let mut world = world();
        let mut arrow = Bullet::fire(
            Position::new(TILE_SIZE + 1.0, TILE_SIZE + 1.0),
            std::f64::consts::PI,
            WeaponType::Bow,
        );
        arrow.grace_period = 0.0;
        world.add_bullet(arrow);
        world.add_bullet(Bullet::fire(
            Position::new(TILE_SIZE + 1.0, TILE_SIZE + 20.0),
            std::f64::consts::PI,
            WeaponType::Gun,
        ));

        world.frame();
        assert!(world.bullets.is_empty());
        assert_eq!(world.debris.len(), 1);
        assert_eq!(world.debris[0].weapon, WeaponType::Bow);
    }

    #[test]
    fn test_enemy_contact_reports_hit_once() {
        let mut world = world();
        let mut enemy = Enemy::spawn(
            CharacterType::Zombie,
            world.local.position,
            self_addr(),
            &Modifiers::default(),
        );
        enemy.lifetime = SPAWN_IDLE_TIME_FRAMES;
        world.enemies.push(enemy);

        let output = world.frame();
        assert_eq!(
            output.hits,
            vec![HitInfo {
                player: self_addr(),
                damage: 2
            }]
        );
        assert!(world.frame().hits.is_empty());
    }

    #[test]
    fn test_spawn_event_adds_enemies() {
        let mut world = world();
        let enemy = Enemy::spawn(
            CharacterType::Zombie,
            world.level.spawn,
            other_addr(),
            &Modifiers::default(),
        );

        let event = world.apply_server_event(Event::spawn_enemies(vec![enemy.clone()]));
        assert_eq!(event, Some(ClientEvent::EnemiesSpawned(vec![enemy])));
        assert_eq!(world.enemies.len(), 1);
    }
}
