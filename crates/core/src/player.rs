//! Players seated in a game session
//!
//! An AI player answers synchronously from its strategy. A buffered player
//! is fed from the network: the session thread blocks in
//! [`BufferedPlayer::wait_decision`] until a move is stored or the
//! connection goes away.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

use crate::board::{Board, Move};
use crate::marble::Marble;
use crate::strategy::Strategy;

/// What a player hands back when asked for its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Move(Move),
    /// The player left; the session must end
    Disconnected,
}

/// A player driven by a [`Strategy`]
pub struct AiPlayer {
    strategy: Box<dyn Strategy>,
    turn: Marble,
}

impl AiPlayer {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self {
            strategy,
            turn: Marble::Empty,
        }
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    pub fn turn(&self) -> Marble {
        self.turn
    }

    /// Never blocks. `None` only if the board is full.
    pub fn decide(&mut self, board: &Board) -> Option<Move> {
        self.strategy
            .decide_move(board)
            .map(|mv| mv.with_marble(self.turn))
    }
}

/// Network-fed player with a single slot mailbox.
///
/// A stored move overwrites one that was not consumed yet. A disconnect is
/// sticky: once signalled, every later wait returns
/// [`Decision::Disconnected`] and stored moves are ignored.
pub struct BufferedPlayer {
    name: String,
    turn: OnceLock<Marble>,
    slot: Mutex<Option<Decision>>,
    ready: Condvar,
}

impl BufferedPlayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            turn: OnceLock::new(),
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Seat color, `Empty` until the player joins a session
    pub fn turn(&self) -> Marble {
        self.turn.get().copied().unwrap_or(Marble::Empty)
    }

    /// Fix the seat color. Returns false if it was already set.
    pub fn assign_turn(&self, turn: Marble) -> bool {
        self.turn.set(turn).is_ok()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Decision>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer a move for the session thread and wake it
    pub fn store_move(&self, mv: Move) {
        let mut slot = self.slot();
        if *slot == Some(Decision::Disconnected) {
            return;
        }
        if slot.is_some() {
            debug!(player = %self.name, "Overwriting unconsumed move");
        }
        *slot = Some(Decision::Move(mv));
        self.ready.notify_all();
    }

    /// Wake a blocked session thread with the disconnect sentinel
    pub fn signal_disconnect(&self) {
        *self.slot() = Some(Decision::Disconnected);
        self.ready.notify_all();
    }

    /// Block until a move or a disconnect arrives
    pub fn wait_decision(&self) -> Decision {
        let mut slot = self
            .ready
            .wait_while(self.slot(), |slot| slot.is_none())
            .unwrap_or_else(PoisonError::into_inner);

        match *slot {
            Some(Decision::Move(mv)) => {
                *slot = None;
                Decision::Move(mv)
            }
            _ => Decision::Disconnected,
        }
    }

    /// Whether a decision is waiting to be consumed
    pub fn has_pending(&self) -> bool {
        self.slot().is_some()
    }
}

/// A seated player. AI and network players are kept apart so a caller
/// always knows whether asking for a move can block.
pub enum Player {
    Ai(AiPlayer),
    Buffered(Arc<BufferedPlayer>),
}

impl Player {
    pub fn ai(strategy: Box<dyn Strategy>) -> Self {
        Player::Ai(AiPlayer::new(strategy))
    }

    pub fn name(&self) -> &str {
        match self {
            Player::Ai(ai) => ai.name(),
            Player::Buffered(buffered) => buffered.name(),
        }
    }

    pub fn turn(&self) -> Marble {
        match self {
            Player::Ai(ai) => ai.turn(),
            Player::Buffered(buffered) => buffered.turn(),
        }
    }

    /// Set the seat color once. Returns false if it was already set.
    pub fn assign_turn(&mut self, turn: Marble) -> bool {
        match self {
            Player::Ai(ai) => {
                if ai.turn.is_empty() {
                    ai.turn = turn;
                    true
                } else {
                    false
                }
            }
            Player::Buffered(buffered) => buffered.assign_turn(turn),
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Player::Buffered(_))
    }

    /// Ask for the next move. Blocks for buffered players.
    pub fn decide(&mut self, board: &Board) -> Decision {
        match self {
            Player::Ai(ai) => match ai.decide(board) {
                Some(mv) => Decision::Move(mv),
                // only reachable on a full board, which ends the game first
                None => Decision::Disconnected,
            },
            Player::Buffered(buffered) => buffered.wait_decision(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::NaiveStrategy;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_ai_player_uses_its_turn() {
        let mut player = Player::ai(Box::new(NaiveStrategy::seeded(4)));
        assert_eq!(player.name(), "naive-strategy");
        assert!(!player.is_blocking());

        assert!(player.assign_turn(Marble::White));
        assert!(!player.assign_turn(Marble::Black));
        assert_eq!(player.turn(), Marble::White);

        let board = Board::new();
        match player.decide(&board) {
            Decision::Move(mv) => {
                assert_eq!(mv.marble(), Marble::White);
                assert!(board.is_valid_move(&mv));
            }
            Decision::Disconnected => panic!("AI player should always move"),
        }
    }

    #[test]
    fn test_buffered_turn_assigned_once() {
        let player = BufferedPlayer::new("alice");
        assert_eq!(player.turn(), Marble::Empty);
        assert!(player.assign_turn(Marble::Black));
        assert!(!player.assign_turn(Marble::White));
        assert_eq!(player.turn(), Marble::Black);
    }

    #[test]
    fn test_last_stored_move_wins() {
        let player = BufferedPlayer::new("alice");
        player.store_move(Move::new(1, 0, Marble::Black));
        player.store_move(Move::new(2, 3, Marble::Black));

        assert_eq!(
            player.wait_decision(),
            Decision::Move(Move::new(2, 3, Marble::Black))
        );
        assert!(!player.has_pending());
    }

    #[test]
    fn test_disconnect_is_sticky() {
        let player = BufferedPlayer::new("alice");
        player.signal_disconnect();
        player.store_move(Move::new(1, 0, Marble::Black));

        assert_eq!(player.wait_decision(), Decision::Disconnected);
        assert_eq!(player.wait_decision(), Decision::Disconnected);
    }

    #[test]
    fn test_blocked_wait_woken_by_move() {
        let player = Arc::new(BufferedPlayer::new("bob"));
        let waiter = {
            let player = Arc::clone(&player);
            thread::spawn(move || player.wait_decision())
        };

        thread::sleep(Duration::from_millis(20));
        player.store_move(Move::new(7, 1, Marble::White));

        assert_eq!(
            waiter.join().unwrap(),
            Decision::Move(Move::new(7, 1, Marble::White))
        );
    }

    #[test]
    fn test_blocked_wait_woken_by_disconnect() {
        let player = Arc::new(BufferedPlayer::new("bob"));
        let waiter = {
            let player = Arc::clone(&player);
            thread::spawn(move || player.wait_decision())
        };

        thread::sleep(Duration::from_millis(20));
        player.signal_disconnect();

        assert_eq!(waiter.join().unwrap(), Decision::Disconnected);
    }
}
