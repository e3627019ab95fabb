use serde::{Deserialize, Serialize};

use crate::level::LevelId;
use crate::modifier::Modifiers;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundPhase {
    WaitingRoom,
    Starting,
    Playing,
    LevelCompleted,
    GameOver,
}

/// Phase-dependent data. Fields a phase doesn't use keep their defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RoundContext {
    /// Wall clock deadline in ms since the epoch (Starting, GameOver).
    pub deadline: u64,
    /// Level being played (Playing) or shown (WaitingRoom).
    pub level: LevelId,
    /// Options offered after a level (LevelCompleted).
    pub modifier_options: Vec<Modifiers>,
    pub options_chosen: bool,
}

/// Round state owned by the server and broadcast on every transition.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoundState {
    pub phase: RoundPhase,
    pub context: RoundContext,
}

impl RoundState {
    pub fn waiting_room() -> Self {
        Self {
            phase: RoundPhase::WaitingRoom,
            context: RoundContext::default(),
        }
    }

    pub fn deadline_passed(&self, now_ms: u64) -> bool {
        now_ms >= self.context.deadline
    }

    /// Whether players may still flip their ready flag.
    pub fn accepts_ready_toggle(&self) -> bool {
        matches!(self.phase, RoundPhase::WaitingRoom | RoundPhase::Starting)
    }
}

impl Default for RoundState {
    fn default() -> Self {
        Self::waiting_room()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_waiting_room_in_lobby() {
        let state = RoundState::default();
        assert_eq!(state.phase, RoundPhase::WaitingRoom);
        assert_eq!(state.context.level, LevelId::Lobby);
        assert!(state.accepts_ready_toggle());
    }

    #[test]
    fn test_deadline() {
        let mut state = RoundState::waiting_room();
        state.context.deadline = 1_000;
        assert!(!state.deadline_passed(999));
        assert!(state.deadline_passed(1_000));
    }

    #[test]
    fn test_ready_toggle_closed_while_playing() {
        let mut state = RoundState::waiting_room();
        state.phase = RoundPhase::Playing;
        assert!(!state.accepts_ready_toggle());
        state.phase = RoundPhase::Starting;
        assert!(state.accepts_ready_toggle());
    }
}
