//! Move model

use crate::marble::Marble;

/// A single turn: place a marble on a field, then rotate a subboard.
///
/// A move only has meaning together with the board it was validated
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    position: usize,
    rotation: usize,
    marble: Marble,
}

impl Move {
    pub fn new(position: usize, rotation: usize, marble: Marble) -> Self {
        Self {
            position,
            rotation,
            marble,
        }
    }

    /// Field index, row-major, 0..36
    pub fn position(&self) -> usize {
        self.position
    }

    /// Rotation index, 0..8
    pub fn rotation(&self) -> usize {
        self.rotation
    }

    pub fn marble(&self) -> Marble {
        self.marble
    }

    /// Same placement and rotation played with another marble
    pub fn with_marble(self, marble: Marble) -> Self {
        Self { marble, ..self }
    }
}
