//! Smoothing for remote players
//!
//! The server broadcasts the player list every few frames. Between two
//! broadcasts a remote player is drawn on the straight line from its previous
//! sample to its current one, reaching the current sample after the expected
//! number of frames and never going past it.

use shared::{ConnectedPlayer, Position, TICK_DECAY};

/// Linear blend from `previous` to `current` after `frames` of `expected`
pub fn interpolate(previous: Position, current: Position, frames: u32, expected: u32) -> Position {
    if expected == 0 {
        return current;
    }

    let t = f64::from(frames.min(expected)) / f64::from(expected);
    Position::new(
        previous.x + (current.x - previous.x) * t,
        previous.y + (current.y - previous.y) * t,
    )
}

/// Client-side view of one connected player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    /// Last authoritative record for this player
    pub connection: ConnectedPlayer,
    pub previous: Position,
    pub current: Position,
    /// Frames since the last authoritative sample
    pub frame_count: u32,
    /// Walk animation counter
    pub move_duration: u32,
    /// Remaining roll animation, counts down to zero
    pub roll_duration: f64,
}

impl PlayerState {
    pub fn new(connection: ConnectedPlayer) -> Self {
        let position = connection.position;
        Self {
            connection,
            previous: position,
            current: position,
            frame_count: 0,
            move_duration: 0,
            roll_duration: 0.0,
        }
    }

    /// Takes a new authoritative sample
    pub fn apply(&mut self, connection: ConnectedPlayer) {
        self.previous = self.current;
        self.current = connection.position;
        self.frame_count = 0;
        if connection.rolling && !self.connection.rolling {
            self.roll_duration = 1.0;
        }
        self.connection = connection;
    }

    pub fn advance_frame(&mut self) {
        self.frame_count = self.frame_count.saturating_add(1);
        self.roll_duration = (self.roll_duration - TICK_DECAY).max(0.0);
        if self.previous == self.current {
            self.move_duration = 0;
        } else {
            self.move_duration += 1;
        }
    }

    /// Where to draw this player right now
    pub fn position(&self, expected_frames: u32) -> Position {
        interpolate(self.previous, self.current, self.frame_count, expected_frames)
    }
}
