//! Player intents
//!
//! Whatever drives the client (a window, a bot, a test) pushes [`Intent`]s
//! onto a queue; the network loop applies them on its next turn. Movement is
//! a held direction rather than a one-shot event, so it stays in effect until
//! the next [`Intent::Move`].

/// A unit-less direction. `(0.0, 0.0)` means standing still.
pub type Direction = (f64, f64);

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Direction to walk in from now on
    Move(Direction),
    /// Aim, in radians
    Aim(f64),
    SwitchWeapon,
    Shoot,
    /// Roll in the current walking direction
    Roll,
    ToggleReady,
    /// Takes the boon the player is standing on
    PickModifier,
    /// Leave the session
    Quit,
}

/// Tracks the held movement direction between frames
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeldInput {
    pub direction: Direction,
}

impl HeldInput {
    /// Records `intent` if it changes held state. Returns whether it did.
    pub fn apply(&mut self, intent: &Intent) -> bool {
        match intent {
            Intent::Move(direction) => {
                self.direction = *direction;
                true
            }
            _ => false,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.direction != (0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_input_creation() {
        let input = HeldInput::default();
        assert!(!input.is_moving());
    }

    #[test]
    fn test_move_is_held() {
        let mut input = HeldInput::default();

        assert!(input.apply(&Intent::Move((1.0, 0.0))));
        assert!(input.is_moving());

        assert!(!input.apply(&Intent::Shoot));
        assert_eq!(input.direction, (1.0, 0.0));

        input.apply(&Intent::Move((0.0, 0.0)));
        assert!(!input.is_moving());
    }
}
