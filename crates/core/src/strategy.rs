//! Move selection strategies for AI players
//!
//! Strategies only ever see a snapshot of the board; any simulation happens
//! on a deep copy so the live game is never touched.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::board::{Board, Move, ROTATIONS};
use crate::marble::Marble;

/// Trait for move selection policies
pub trait Strategy: Send {
    /// Name used as the AI player's username
    fn name(&self) -> &str;

    /// Pick the next move for the side to move.
    ///
    /// Returns `None` only when the board has no empty field left.
    fn decide_move(&mut self, board: &Board) -> Option<Move>;
}

/// Uniformly random legal moves
pub struct NaiveStrategy {
    rng: StdRng,
}

impl NaiveStrategy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for reproducible games
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for NaiveStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for NaiveStrategy {
    fn name(&self) -> &str {
        "naive-strategy"
    }

    fn decide_move(&mut self, board: &Board) -> Option<Move> {
        board.possible_move(&mut self.rng)
    }
}

/// One move of lookahead.
///
/// Plays an immediately winning move if there is one. Otherwise, if the
/// opponent has a winning placement, takes that placement itself. Otherwise
/// plays randomly. Candidates are scanned by position, then rotation, both
/// ascending, so the choice is deterministic whenever a win exists.
pub struct ExpertStrategy {
    rng: StdRng,
}

impl ExpertStrategy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// First move of `marble` that leaves `marble` winning
    fn winning_move(board: &Board, marble: Marble) -> Option<Move> {
        board.empty_fields().into_iter().find_map(|position| {
            (0..ROTATIONS)
                .map(|rotation| Move::new(position, rotation, marble))
                .find(|mv| {
                    let mut simulated = board.deep_copy();
                    simulated.play_move(*mv);
                    simulated.is_winner(marble)
                })
        })
    }
}

impl Default for ExpertStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for ExpertStrategy {
    fn name(&self) -> &str {
        "expert-strategy"
    }

    fn decide_move(&mut self, board: &Board) -> Option<Move> {
        let turn = board.turn();

        if let Some(mv) = Self::winning_move(board, turn) {
            return Some(mv);
        }

        // occupy the cell the opponent would win with
        if let Some(mv) = Self::winning_move(board, turn.reverse()) {
            return Some(mv.with_marble(turn));
        }

        board.possible_move(&mut self.rng)
    }
}
