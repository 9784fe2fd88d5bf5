//! Game outcomes

use std::fmt;

use crate::board::Board;
use crate::marble::Marble;

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameResult {
    Victory { winner: String },
    Draw,
    Disconnect { player: String },
}

impl GameResult {
    /// Outcome of a finished board. `name_of` maps a marble to its player.
    ///
    /// Black is checked first, so a rotation completing both lines at once
    /// counts for black. Returns `None` while the game is still open.
    pub fn from_board<F>(board: &Board, name_of: F) -> Option<Self>
    where
        F: Fn(Marble) -> String,
    {
        [Marble::Black, Marble::White]
            .into_iter()
            .find(|marble| board.is_winner(*marble))
            .map(|marble| GameResult::Victory {
                winner: name_of(marble),
            })
            .or_else(|| board.is_full().then_some(GameResult::Draw))
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Victory { winner } => write!(f, "{winner} won"),
            GameResult::Draw => f.write_str("draw"),
            GameResult::Disconnect { player } => write!(f, "{player} disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(marble: Marble) -> String {
        marble.to_string()
    }

    #[test]
    fn test_open_board_has_no_result() {
        assert_eq!(GameResult::from_board(&Board::new(), name), None);
    }

    #[test]
    fn test_victory() {
        let mut board = Board::new();
        board.set_fields(Marble::White, &[1, 7, 13, 19, 25]);
        assert_eq!(
            GameResult::from_board(&board, name),
            Some(GameResult::Victory {
                winner: "white".into()
            })
        );
    }

    #[test]
    fn test_black_checked_first() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[0, 1, 2, 3, 4]);
        board.set_fields(Marble::White, &[30, 31, 32, 33, 34]);
        assert_eq!(
            GameResult::from_board(&board, name),
            Some(GameResult::Victory {
                winner: "black".into()
            })
        );
    }

    #[test]
    fn test_draw() {
        let mut board = Board::new();
        for i in (0..36).step_by(2) {
            let marble = if i >= 18 { Marble::Black } else { Marble::White };
            board.set_field(marble, i);
            board.set_field(marble.reverse(), i + 1);
        }
        assert_eq!(GameResult::from_board(&board, name), Some(GameResult::Draw));
    }
}
