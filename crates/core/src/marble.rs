//! Marbles placed on the board

use std::fmt;

/// A field value: a player's marble or nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Marble {
    Black,
    White,
    #[default]
    Empty,
}

impl Marble {
    /// The opponent's marble. `Empty` stays `Empty`.
    pub fn reverse(self) -> Self {
        match self {
            Marble::Black => Marble::White,
            Marble::White => Marble::Black,
            Marble::Empty => Marble::Empty,
        }
    }

    /// Seat index used for turn slots (black moves first)
    pub fn seat(self) -> Option<usize> {
        match self {
            Marble::Black => Some(0),
            Marble::White => Some(1),
            Marble::Empty => None,
        }
    }

    pub fn is_empty(self) -> bool {
        self == Marble::Empty
    }
}

impl fmt::Display for Marble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Marble::Black => "black",
            Marble::White => "white",
            Marble::Empty => "empty",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse() {
        assert_eq!(Marble::Black.reverse(), Marble::White);
        assert_eq!(Marble::White.reverse(), Marble::Black);
        assert_eq!(Marble::Empty.reverse(), Marble::Empty);
    }

    #[test]
    fn test_seat_order() {
        assert_eq!(Marble::Black.seat(), Some(0));
        assert_eq!(Marble::White.seat(), Some(1));
        assert_eq!(Marble::Empty.seat(), None);
    }
}
