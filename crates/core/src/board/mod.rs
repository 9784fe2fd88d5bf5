//! Board model
//!
//! A 6x6 grid of marbles, row-major (index = row * 6 + col), split into four
//! 3x3 subboards. Every move places a marble and then rotates one subboard;
//! the rotation completes the move and hands the turn to the other side.

mod moves;
mod rotation;

pub use moves::Move;
pub use rotation::{Rotation, ROTATIONS};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::marble::Marble;

/// Board width and height
pub const DIM: usize = 6;
/// Subboard width and height
pub const SUB_DIM: usize = 3;
/// Marbles in a row needed to win
pub const WINNING_STREAK: usize = 5;
/// Number of fields on the board
pub const CELLS: usize = DIM * DIM;

/// Offset that maps a subboard cell onto its rotated position
const CENTER: usize = SUB_DIM - 1;

/// Pentago board state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    fields: [Marble; CELLS],
    turn: Marble,
}

impl Board {
    /// Empty board, black to move
    pub fn new() -> Self {
        Self {
            fields: [Marble::Empty; CELLS],
            turn: Marble::Black,
        }
    }

    /// Clear every field and give the first turn back to black
    pub fn reset(&mut self) {
        self.fields = [Marble::Empty; CELLS];
        self.turn = Marble::Black;
    }

    /// Independent copy for simulating moves without touching a live game
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Side to move
    pub fn turn(&self) -> Marble {
        self.turn
    }

    pub fn fields(&self) -> &[Marble; CELLS] {
        &self.fields
    }

    /// Field value, `None` if the index is off the board
    pub fn field(&self, index: usize) -> Option<Marble> {
        self.fields.get(index).copied()
    }

    pub fn set_field(&mut self, marble: Marble, index: usize) {
        self.fields[index] = marble;
    }

    pub fn set_fields(&mut self, marble: Marble, indexes: &[usize]) {
        for &index in indexes {
            self.set_field(marble, index);
        }
    }

    /// True if every listed field holds `marble`
    pub fn has_fields(&self, marble: Marble, indexes: &[usize]) -> bool {
        indexes.iter().all(|&i| self.fields[i] == marble)
    }

    pub fn index(row: usize, col: usize) -> usize {
        row * DIM + col
    }

    pub fn is_valid_field(index: usize) -> bool {
        index < CELLS
    }

    pub fn is_valid_rotation(index: usize) -> bool {
        index < ROTATIONS
    }

    /// Position on the board and empty, rotation in range
    pub fn is_valid_move(&self, mv: &Move) -> bool {
        Self::is_valid_field(mv.position())
            && self.fields[mv.position()] == Marble::Empty
            && Self::is_valid_rotation(mv.rotation())
    }

    /// Place the marble, then rotate. The caller validates the move first.
    pub fn play_move(&mut self, mv: Move) {
        self.set_field(mv.marble(), mv.position());
        self.rotate(mv.rotation());
    }

    /// Rotate by rotation index (see [`Rotation`]) and pass the turn
    pub fn rotate(&mut self, index: usize) {
        debug_assert!(Self::is_valid_rotation(index), "rotation {index} out of range");
        if let Some(rotation) = Rotation::from_index(index) {
            self.rotate_quadrant(rotation.top, rotation.left, rotation.clockwise);
        }
    }

    /// Rotate one subboard a quarter turn and pass the turn
    pub fn rotate_quadrant(&mut self, top: bool, left: bool, clockwise: bool) {
        let init_row = if top { 0 } else { SUB_DIM };
        let init_col = if left { 0 } else { SUB_DIM };

        let mut rotated = self.fields;
        for row in init_row..init_row + SUB_DIM {
            for col in init_col..init_col + SUB_DIM {
                let (next_row, next_col) = if clockwise {
                    (init_row + (col - init_col), init_col + (init_row + CENTER - row))
                } else {
                    (init_row + (init_col + CENTER - col), init_col + (row - init_row))
                };
                rotated[Self::index(next_row, next_col)] = self.fields[Self::index(row, col)];
            }
        }

        self.fields = rotated;
        self.turn = self.turn.reverse();
    }

    pub fn is_game_over(&self) -> bool {
        self.is_full() || self.has_winner()
    }

    pub fn is_full(&self) -> bool {
        !self.fields.contains(&Marble::Empty)
    }

    pub fn has_winner(&self) -> bool {
        self.is_winner(Marble::Black) || self.is_winner(Marble::White)
    }

    /// Five in a row of `marble` along a row, column or diagonal.
    /// Only meaningful for black or white.
    pub fn is_winner(&self, marble: Marble) -> bool {
        self.has_column(marble) || self.has_row(marble) || self.has_diagonal(marble)
    }

    pub fn has_row(&self, marble: Marble) -> bool {
        (0..=DIM - WINNING_STREAK).any(|shift| {
            (0..DIM).any(|row| self.is_streak(marble, row * DIM + shift, 1))
        })
    }

    pub fn has_column(&self, marble: Marble) -> bool {
        (0..=DIM - WINNING_STREAK)
            .any(|shift| (0..DIM).any(|col| self.is_streak(marble, col + DIM * shift, DIM)))
    }

    pub fn has_diagonal(&self, marble: Marble) -> bool {
        self.has_ascending_diagonal(marble) || self.has_descending_diagonal(marble)
    }

    fn has_ascending_diagonal(&self, marble: Marble) -> bool {
        const STRIDE: usize = DIM - 1;

        // the two short diagonals either side of the anti-diagonal
        if self.is_streak(marble, DIM - 2, STRIDE)
            || self.is_streak(marble, 2 * DIM - 1, STRIDE)
        {
            return true;
        }
        (0..=DIM - WINNING_STREAK)
            .any(|shift| self.is_streak(marble, STRIDE * (shift + 1), STRIDE))
    }

    fn has_descending_diagonal(&self, marble: Marble) -> bool {
        const STRIDE: usize = DIM + 1;

        if self.is_streak(marble, 1, STRIDE) || self.is_streak(marble, DIM, STRIDE) {
            return true;
        }
        (0..=DIM - WINNING_STREAK).any(|shift| self.is_streak(marble, STRIDE * shift, STRIDE))
    }

    fn is_streak(&self, marble: Marble, start: usize, stride: usize) -> bool {
        (0..WINNING_STREAK).all(|i| self.fields[start + i * stride] == marble)
    }

    /// Indexes of all empty fields, ascending
    pub fn empty_fields(&self) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of fields holding `marble`
    pub fn count(&self, marble: Marble) -> usize {
        self.fields.iter().filter(|&&m| m == marble).count()
    }

    /// Uniformly random empty field with a uniformly random rotation,
    /// played by the side to move. `None` on a full board.
    pub fn possible_move<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Move> {
        let position = *self.empty_fields().choose(rng)?;
        let rotation = rng.gen_range(0..ROTATIONS);
        Some(Move::new(position, rotation, self.turn))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Alternating pairs, colours swapped at the midpoint: full, no streak
    fn fill_without_winner(board: &mut Board) {
        for i in (0..CELLS).step_by(2) {
            let marble = if i >= CELLS / 2 {
                Marble::Black
            } else {
                Marble::White
            };
            board.set_field(marble, i);
            board.set_field(marble.reverse(), i + 1);
        }
    }

    #[test]
    fn test_new_board_is_empty() {
        let board = Board::new();
        assert!(board.fields().iter().all(|m| m.is_empty()));
        assert_eq!(board.turn(), Marble::Black);
        assert!(!board.is_game_over());
    }

    #[test]
    fn test_set_and_get_field() {
        let mut board = Board::new();
        assert_eq!(board.field(0), Some(Marble::Empty));
        board.set_field(Marble::Black, 0);
        assert_eq!(board.field(0), Some(Marble::Black));
        assert_eq!(board.field(CELLS), None);
    }

    #[test]
    fn test_has_fields() {
        let mut board = Board::new();
        assert!(!board.has_fields(Marble::White, &[0, 15, 21]));
        board.set_fields(Marble::White, &[0, 15, 21]);
        assert!(board.has_fields(Marble::White, &[0, 15, 21]));
    }

    #[test]
    fn test_is_full() {
        let mut board = Board::new();
        assert!(!board.is_full());
        for i in 0..CELLS {
            board.set_field(Marble::Black, i);
        }
        assert!(board.is_full());
    }

    #[test]
    fn test_rotate_top_left_clockwise() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[0, 7, 14]);
        board.set_fields(Marble::White, &[1, 8]);
        board.rotate_quadrant(true, true, true);

        assert!(board.has_fields(Marble::Black, &[2, 7, 12]));
        assert!(board.has_fields(Marble::White, &[8, 13]));
        assert!(board.has_fields(Marble::Empty, &[0, 1, 6, 14]));
    }

    #[test]
    fn test_rotate_top_left_counterclockwise() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[1, 6, 13]);
        board.set_fields(Marble::White, &[8, 12]);
        board.rotate_quadrant(true, true, false);

        assert!(board.has_fields(Marble::Black, &[6, 13, 8]));
        assert!(board.has_fields(Marble::White, &[1, 14]));
        assert!(board.has_fields(Marble::Empty, &[0, 2, 7, 12]));
    }

    #[test]
    fn test_rotate_top_right() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[3, 9, 16]);
        board.set_fields(Marble::White, &[5, 10]);
        board.rotate_quadrant(true, false, false);

        assert!(board.has_fields(Marble::Black, &[15, 16, 11]));
        assert!(board.has_fields(Marble::White, &[3, 10]));
        assert!(board.has_fields(Marble::Empty, &[4, 5, 9]));

        let mut board = Board::new();
        board.set_fields(Marble::Black, &[3, 9, 15]);
        board.set_fields(Marble::White, &[11, 17]);
        board.rotate_quadrant(true, false, true);

        assert!(board.has_fields(Marble::Black, &[3, 4, 5]));
        assert!(board.has_fields(Marble::White, &[15, 16]));
        assert!(board.has_fields(Marble::Empty, &[9, 10, 11, 17]));
    }

    #[test]
    fn test_rotate_bottom_right() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[23, 28, 29, 33]);
        board.set_fields(Marble::White, &[22, 34, 35]);
        board.rotate_quadrant(false, false, false);

        assert!(board.has_fields(Marble::Black, &[21, 22, 28, 35]));
        assert!(board.has_fields(Marble::White, &[23, 27, 29]));
        assert!(board.has_fields(Marble::Empty, &[33, 34]));

        let mut board = Board::new();
        board.set_fields(Marble::Black, &[21, 28, 35]);
        board.set_fields(Marble::White, &[34, 27]);
        board.rotate_quadrant(false, false, true);

        assert!(board.has_fields(Marble::Black, &[23, 28, 33]));
        assert!(board.has_fields(Marble::White, &[27, 22]));
        assert!(board.has_fields(Marble::Empty, &[21, 29, 34, 35]));
    }

    #[test]
    fn test_rotate_bottom_left() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[19, 25]);
        board.set_fields(Marble::White, &[24, 26, 30, 32]);
        board.rotate_quadrant(false, true, true);

        assert!(board.has_fields(Marble::Black, &[25, 26]));
        assert!(board.has_fields(Marble::White, &[18, 19, 30, 31]));
        assert!(board.has_fields(Marble::Empty, &[20, 24, 32]));

        let mut board = Board::new();
        board.set_fields(Marble::Black, &[18, 24, 31, 32]);
        board.set_fields(Marble::White, &[19, 26]);
        board.rotate_quadrant(false, true, false);

        assert!(board.has_fields(Marble::Black, &[30, 31, 20, 26]));
        assert!(board.has_fields(Marble::White, &[24, 19]));
        assert!(board.has_fields(Marble::Empty, &[32, 25, 18]));
    }

    #[test]
    fn test_four_rotations_restore_subboard() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[0, 2, 13]);
        board.set_fields(Marble::White, &[1, 12]);
        let before = *board.fields();

        for index in 0..ROTATIONS {
            for _ in 0..4 {
                board.rotate(index);
            }
            assert_eq!(board.fields(), &before, "rotation {index}");
        }
    }

    #[test]
    fn test_rotation_then_inverse_restores_board() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[3, 10, 22, 30]);
        board.set_fields(Marble::White, &[5, 27, 33]);
        let before = *board.fields();

        for index in 0..ROTATIONS {
            let inverse = Rotation::from_index(index).unwrap().inverse().index();
            board.rotate(index);
            board.rotate(inverse);
            assert_eq!(board.fields(), &before);
        }
    }

    #[test]
    fn test_play_move_flips_turn_once() {
        let mut board = Board::new();
        board.play_move(Move::new(0, 6, Marble::Black));
        assert_eq!(board.turn(), Marble::White);
        assert_eq!(board.field(0), Some(Marble::Black));

        board.play_move(Move::new(35, 0, Marble::White));
        assert_eq!(board.turn(), Marble::Black);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let mut board = Board::new();
        board.play_move(Move::new(14, 1, Marble::Black));

        let mut copy = board.deep_copy();
        assert_eq!(copy, board);

        copy.play_move(Move::new(20, 5, Marble::White));
        assert_ne!(copy, board);
        assert_eq!(board.count(Marble::White), 0);
        assert_eq!(board.turn(), Marble::White);
    }

    #[test]
    fn test_valid_move() {
        let mut board = Board::new();
        assert!(board.is_valid_move(&Move::new(0, 0, Marble::Black)));
        assert!(board.is_valid_move(&Move::new(35, 7, Marble::Black)));
        assert!(!board.is_valid_move(&Move::new(36, 0, Marble::Black)));
        assert!(!board.is_valid_move(&Move::new(0, 8, Marble::Black)));

        board.set_field(Marble::White, 10);
        assert!(!board.is_valid_move(&Move::new(10, 0, Marble::Black)));
    }

    #[test]
    fn test_draw_when_full_without_streak() {
        let mut board = Board::new();
        fill_without_winner(&mut board);
        assert!(board.is_full());
        assert!(!board.has_winner());
        assert!(board.is_game_over());
    }

    #[test]
    fn test_row_wins() {
        let mut board = Board::new();
        assert!(!board.is_winner(Marble::White));
        board.set_fields(Marble::White, &[0, 1, 2, 3, 4]);
        assert!(board.is_winner(Marble::White));
        assert!(!board.is_winner(Marble::Black));

        let mut board = Board::new();
        board.set_fields(Marble::Black, &[19, 20, 21, 22, 23]);
        assert!(board.is_winner(Marble::Black));
    }

    #[test]
    fn test_column_wins() {
        let mut board = Board::new();
        board.set_fields(Marble::White, &[0, 6, 12, 18, 24]);
        assert!(board.is_winner(Marble::White));

        let mut board = Board::new();
        board.set_fields(Marble::Black, &[9, 15, 21, 27, 33]);
        assert!(board.is_winner(Marble::Black));
    }

    #[test]
    fn test_diagonal_wins() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[4, 9, 14, 19, 24]);
        assert!(board.is_winner(Marble::Black));

        let mut board = Board::new();
        board.set_fields(Marble::Black, &[7, 14, 21, 28, 35]);
        assert!(board.is_winner(Marble::Black));

        let mut board = Board::new();
        board.set_fields(Marble::White, &[6, 13, 20, 27, 34]);
        assert!(board.is_winner(Marble::White));

        let mut board = Board::new();
        board.set_fields(Marble::White, &[11, 16, 21, 26, 31]);
        assert!(board.is_winner(Marble::White));
    }

    #[test]
    fn test_win_after_rotation() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[0, 7, 14, 28, 33]);
        assert!(!board.is_winner(Marble::Black));
        board.rotate_quadrant(false, false, true);
        assert!(board.is_winner(Marble::Black));

        let mut board = Board::new();
        board.set_fields(Marble::White, &[0, 1, 2, 5, 11]);
        assert!(!board.is_winner(Marble::White));
        board.rotate_quadrant(true, false, false);
        assert!(board.is_winner(Marble::White));
    }

    #[test]
    fn test_opponent_marble_breaks_streak() {
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[6, 7, 8, 10]);
        board.set_field(Marble::White, 9);
        assert!(!board.is_winner(Marble::Black));
    }

    #[test]
    fn test_black_wins_row_with_played_moves() {
        let mut board = Board::new();
        let moves = [
            (0, 6, Marble::Black),
            (18, 7, Marble::White),
            (1, 5, Marble::Black),
            (14, 4, Marble::White),
            (2, 3, Marble::Black),
            (17, 7, Marble::White),
            (3, 6, Marble::Black),
            (15, 4, Marble::White),
        ];
        for (position, rotation, marble) in moves {
            board.play_move(Move::new(position, rotation, marble));
            assert!(!board.is_game_over());
        }

        board.play_move(Move::new(4, 7, Marble::Black));
        assert!(board.is_game_over());
        assert!(board.is_winner(Marble::Black));
    }

    #[test]
    fn test_white_wins_diagonal_with_played_moves() {
        let mut board = Board::new();
        let moves = [
            (2, 2, Marble::Black),
            (0, 5, Marble::White),
            (35, 3, Marble::Black),
            (7, 4, Marble::White),
            (5, 2, Marble::Black),
            (14, 5, Marble::White),
            (17, 2, Marble::Black),
            (21, 4, Marble::White),
            (18, 5, Marble::Black),
        ];
        for (position, rotation, marble) in moves {
            board.play_move(Move::new(position, rotation, marble));
            assert!(!board.is_game_over());
        }

        board.play_move(Move::new(28, 2, Marble::White));
        assert!(board.is_game_over());
        assert!(board.is_winner(Marble::White));
    }

    #[test]
    fn test_possible_move_is_legal() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = Board::new();
        board.set_fields(Marble::Black, &[0, 1, 2, 3]);

        for _ in 0..100 {
            let mv = board.possible_move(&mut rng).unwrap();
            assert!(board.is_valid_move(&mv));
            assert_eq!(mv.marble(), Marble::Black);
        }
    }

    #[test]
    fn test_possible_move_on_full_board() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = Board::new();
        fill_without_winner(&mut board);
        assert!(board.possible_move(&mut rng).is_none());
    }
}
