//! Round state machine
//!
//! [`RoundDirector::poll`] runs once per server tick. It reads a summary of
//! the world, advances the [`RoundState`] and returns the side effects the
//! network loop has to carry out. Keeping it free of sockets and locks lets
//! the transitions be tested on their own.

use log::info;
use rand::Rng;
use shared::{LevelId, Modifiers, RoundContext, RoundPhase, RoundState, TICK_DECAY};

/// Countdown between everyone being ready and the level starting
pub const STARTING_DURATION_MS: u64 = 2_000;
/// Time the game over screen stays up before returning to the lobby
pub const GAME_OVER_DURATION_MS: u64 = 4_000;

pub const INITIAL_SPAWN_COOLDOWN: f64 = 10.0;
pub const MINIMUM_SPAWN_COOLDOWN: f64 = 20.0;

/// What the director needs to know about the world each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundInputs {
    /// At least one player connected and every player ready
    pub all_ready: bool,
    pub alive_players: usize,
    pub enemies_alive: usize,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundAction {
    LoadLevel(LevelId),
    /// Sent once, when the first level starts
    UnregisterFromMediation,
    SpawnWave,
    /// Back to the lobby: clear ready flags, enemies and modifiers
    ResetLobby,
}

#[derive(Debug)]
pub struct RoundDirector {
    state: RoundState,
    /// Level currently loaded by the world
    current_level: LevelId,
    arena_count: u8,
    /// Levels started since the last reset. Also the number of waves per level.
    level_count: u32,
    spawn_cooldown: f64,
    remaining_spawn_cycles: u32,
    started: bool,
}

impl RoundDirector {
    pub fn new(arena_count: u8) -> Self {
        Self {
            state: RoundState::waiting_room(),
            current_level: LevelId::Lobby,
            arena_count: arena_count.max(1),
            level_count: 0,
            spawn_cooldown: INITIAL_SPAWN_COOLDOWN,
            remaining_spawn_cycles: 0,
            started: false,
        }
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase
    }

    pub fn level_count(&self) -> u32 {
        self.level_count
    }

    pub fn spawn_cooldown(&self) -> f64 {
        self.spawn_cooldown
    }

    pub fn remaining_spawn_cycles(&self) -> u32 {
        self.remaining_spawn_cycles
    }

    /// Whether the first level has ever started
    pub fn started(&self) -> bool {
        self.started
    }

    pub fn accepts_ready_toggle(&self) -> bool {
        self.state.accepts_ready_toggle()
    }

    /// Records a modifier pick. Only the first pick after a level counts.
    pub fn choose_modifier(&mut self) -> bool {
        if self.state.phase != RoundPhase::LevelCompleted || self.state.context.options_chosen {
            return false;
        }
        self.state.context.options_chosen = true;
        true
    }

    pub fn tick_cooldown(&mut self) {
        self.spawn_cooldown = (self.spawn_cooldown - TICK_DECAY).max(0.0);
    }

    /// Advances the state machine by one tick
    pub fn poll<R: Rng>(&mut self, inputs: RoundInputs, now: u64, rng: &mut R) -> Vec<RoundAction> {
        let mut actions = Vec::new();

        match self.state.phase {
            RoundPhase::WaitingRoom => {
                if inputs.all_ready {
                    self.transition(RoundPhase::Starting, self.countdown(now));
                }
            }

            RoundPhase::Starting => {
                if !inputs.all_ready {
                    let context = RoundContext {
                        level: self.current_level,
                        ..RoundContext::default()
                    };
                    self.transition(RoundPhase::WaitingRoom, context);
                } else if self.state.deadline_passed(now) {
                    let level = LevelId::Arena(rng.gen_range(1..=self.arena_count));
                    self.level_count += 1;
                    self.spawn_cooldown = INITIAL_SPAWN_COOLDOWN;
                    self.remaining_spawn_cycles = self.level_count;

                    if !self.started {
                        self.started = true;
                        actions.push(RoundAction::UnregisterFromMediation);
                    }

                    self.current_level = level;
                    actions.push(RoundAction::LoadLevel(level));

                    let context = RoundContext {
                        level,
                        ..RoundContext::default()
                    };
                    self.transition(RoundPhase::Playing, context);
                }
            }

            RoundPhase::Playing => {
                if inputs.alive_players == 0 {
                    let context = RoundContext {
                        deadline: now + GAME_OVER_DURATION_MS,
                        level: self.current_level,
                        ..RoundContext::default()
                    };
                    self.transition(RoundPhase::GameOver, context);
                } else if self.spawn_cooldown <= 0.0 && self.remaining_spawn_cycles > 0 {
                    self.remaining_spawn_cycles -= 1;
                    self.spawn_cooldown =
                        MINIMUM_SPAWN_COOLDOWN + rng.gen_range(0.0..MINIMUM_SPAWN_COOLDOWN);
                    actions.push(RoundAction::SpawnWave);
                } else if self.remaining_spawn_cycles == 0 && inputs.enemies_alive == 0 {
                    let context = RoundContext {
                        level: self.current_level,
                        modifier_options: Modifiers::random_options(rng),
                        ..RoundContext::default()
                    };
                    self.transition(RoundPhase::LevelCompleted, context);
                }
            }

            RoundPhase::LevelCompleted => {
                if self.state.context.options_chosen {
                    self.transition(RoundPhase::Starting, self.countdown(now));
                }
            }

            RoundPhase::GameOver => {
                if self.state.deadline_passed(now) {
                    self.level_count = 0;
                    self.remaining_spawn_cycles = 0;
                    self.current_level = LevelId::Lobby;
                    actions.push(RoundAction::ResetLobby);
                    self.transition(RoundPhase::WaitingRoom, RoundContext::default());
                }
            }
        }

        actions
    }

    fn countdown(&self, now: u64) -> RoundContext {
        RoundContext {
            deadline: now + STARTING_DURATION_MS,
            level: self.current_level,
            ..RoundContext::default()
        }
    }

    fn transition(&mut self, phase: RoundPhase, context: RoundContext) {
        info!(
            "Round state {:?} -> {:?} ({})",
            self.state.phase, phase, context.level
        );
        self.state = RoundState { phase, context };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn inputs(all_ready: bool, alive_players: usize, enemies_alive: usize) -> RoundInputs {
        RoundInputs {
            all_ready,
            alive_players,
            enemies_alive,
        }
    }

    /// Drives a fresh director into Playing at time 0
    fn playing(rng: &mut StdRng) -> RoundDirector {
        let mut director = RoundDirector::new(2);
        director.poll(inputs(true, 1, 0), 0, rng);
        director.poll(inputs(true, 1, 0), STARTING_DURATION_MS, rng);
        assert_eq!(director.phase(), RoundPhase::Playing);
        director
    }

    #[test]
    fn test_all_ready_starts_countdown() {
        let mut rng = rng();
        let mut director = RoundDirector::new(2);

        assert!(director.poll(inputs(false, 1, 0), 0, &mut rng).is_empty());
        assert_eq!(director.phase(), RoundPhase::WaitingRoom);

        director.poll(inputs(true, 1, 0), 100, &mut rng);
        assert_eq!(director.phase(), RoundPhase::Starting);
        assert_eq!(director.state().context.deadline, 100 + STARTING_DURATION_MS);
    }

    #[test]
    fn test_unready_reverts_to_waiting_room() {
        let mut rng = rng();
        let mut director = RoundDirector::new(2);
        director.poll(inputs(true, 1, 0), 0, &mut rng);

        director.poll(inputs(false, 1, 0), 500, &mut rng);
        assert_eq!(director.phase(), RoundPhase::WaitingRoom);
        assert_eq!(director.state().context.level, LevelId::Lobby);
    }

    #[test]
    fn test_countdown_expiry_loads_arena() {
        let mut rng = rng();
        let mut director = RoundDirector::new(2);
        director.poll(inputs(true, 1, 0), 0, &mut rng);

        assert!(director
            .poll(inputs(true, 1, 0), STARTING_DURATION_MS - 1, &mut rng)
            .is_empty());

        let actions = director.poll(inputs(true, 1, 0), STARTING_DURATION_MS, &mut rng);
        assert_eq!(actions[0], RoundAction::UnregisterFromMediation);
        let level = match actions[1] {
            RoundAction::LoadLevel(level) => level,
            other => panic!("expected a level load, got {:?}", other),
        };
        assert!(matches!(level, LevelId::Arena(1..=2)));
        assert_eq!(director.phase(), RoundPhase::Playing);
        assert_eq!(director.state().context.level, level);
        assert_eq!(director.level_count(), 1);
        assert_eq!(director.remaining_spawn_cycles(), 1);
        assert!(director.started());
    }

    #[test]
    fn test_no_alive_players_is_game_over() {
        let mut rng = rng();
        let mut director = playing(&mut rng);

        director.poll(inputs(true, 0, 3), 5_000, &mut rng);
        assert_eq!(director.phase(), RoundPhase::GameOver);
        assert_eq!(director.state().context.deadline, 5_000 + GAME_OVER_DURATION_MS);
    }

    #[test]
    fn test_spawn_waits_for_cooldown() {
        let mut rng = rng();
        let mut director = playing(&mut rng);

        assert!(director.poll(inputs(true, 1, 0), 3_000, &mut rng).is_empty());

        while director.spawn_cooldown() > 0.0 {
            director.tick_cooldown();
        }
        let actions = director.poll(inputs(true, 1, 0), 3_000, &mut rng);
        assert_eq!(actions, vec![RoundAction::SpawnWave]);
        assert_eq!(director.remaining_spawn_cycles(), 0);
        assert!(director.spawn_cooldown() >= MINIMUM_SPAWN_COOLDOWN);
    }

    #[test]
    fn test_level_completes_once_waves_are_cleared() {
        let mut rng = rng();
        let mut director = playing(&mut rng);
        while director.spawn_cooldown() > 0.0 {
            director.tick_cooldown();
        }
        director.poll(inputs(true, 1, 0), 3_000, &mut rng);

        director.poll(inputs(true, 1, 4), 3_100, &mut rng);
        assert_eq!(director.phase(), RoundPhase::Playing);

        director.poll(inputs(true, 1, 0), 3_200, &mut rng);
        assert_eq!(director.phase(), RoundPhase::LevelCompleted);
        assert_eq!(director.state().context.modifier_options.len(), 2);
        assert!(!director.state().context.options_chosen);
    }

    #[test]
    fn test_modifier_choice_restarts_countdown() {
        let mut rng = rng();
        let mut director = playing(&mut rng);
        assert!(!director.choose_modifier());

        while director.spawn_cooldown() > 0.0 {
            director.tick_cooldown();
        }
        director.poll(inputs(true, 1, 0), 3_000, &mut rng);
        director.poll(inputs(true, 1, 0), 3_100, &mut rng);
        assert_eq!(director.phase(), RoundPhase::LevelCompleted);

        assert!(director.choose_modifier());
        assert!(!director.choose_modifier());

        director.poll(inputs(true, 1, 0), 3_200, &mut rng);
        assert_eq!(director.phase(), RoundPhase::Starting);

        let actions = director.poll(inputs(true, 1, 0), 3_200 + STARTING_DURATION_MS, &mut rng);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], RoundAction::LoadLevel(LevelId::Arena(_))));
        assert_eq!(director.level_count(), 2);
        assert_eq!(director.remaining_spawn_cycles(), 2);
    }

    #[test]
    fn test_game_over_resets_to_lobby() {
        let mut rng = rng();
        let mut director = playing(&mut rng);
        director.poll(inputs(true, 0, 0), 5_000, &mut rng);

        assert!(director.poll(inputs(false, 0, 0), 6_000, &mut rng).is_empty());

        let actions = director.poll(inputs(false, 0, 0), 5_000 + GAME_OVER_DURATION_MS, &mut rng);
        assert_eq!(actions, vec![RoundAction::ResetLobby]);
        assert_eq!(*director.state(), RoundState::waiting_room());
        assert_eq!(director.level_count(), 0);
    }

    #[test]
    fn test_cooldown_never_negative() {
        let mut director = RoundDirector::new(1);
        for _ in 0..1_000 {
            director.tick_cooldown();
        }
        assert_eq!(director.spawn_cooldown(), 0.0);
    }
}
