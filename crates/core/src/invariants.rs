//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::board::Board;
use crate::marble::Marble;

/// Validate a board that was only ever mutated through `play_move`
/// starting from an empty board.
pub fn assert_board_invariants(board: &Board) {
    let black = board.count(Marble::Black);
    let white = board.count(Marble::White);

    // Black moves first, so it is never behind and at most one ahead
    debug_assert!(
        black == white || black == white + 1,
        "Board has {} black and {} white marbles",
        black,
        white
    );

    debug_assert!(
        !board.turn().is_empty(),
        "Board has no side to move"
    );

    // The side to move is the one with fewer marbles, black on ties
    let expected = if black == white {
        Marble::Black
    } else {
        Marble::White
    };
    debug_assert!(
        board.turn() == expected,
        "Board turn is {} with {} black and {} white marbles",
        board.turn(),
        black,
        white
    );
}

/// Validate that a move was played by the side on turn
pub fn assert_move_by_turn(board: &Board, marble: Marble) {
    debug_assert!(
        board.turn() == marble,
        "Move by {} while {} is to move",
        marble,
        board.turn()
    );
}
