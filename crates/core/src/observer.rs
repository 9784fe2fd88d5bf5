//! Session event observers

use tracing::info;
use uuid::Uuid;

use crate::board::Move;

/// Receives session events in play order.
///
/// Callbacks run on the session thread and must not block on that session.
pub trait BoardObserver: Send {
    /// Both seats are filled; names are in seat order (black, white)
    fn on_start(&mut self, players: &[String]);

    /// Called after the move has been applied to the board
    fn on_move(&mut self, mv: &Move);

    fn on_winner(&mut self, name: &str);

    fn on_draw(&mut self);

    fn on_disconnect(&mut self, name: &str);

    /// Always the last event a session delivers
    fn on_close(&mut self);
}

/// Local sink that records every event through tracing
pub struct LoggingObserver {
    session_id: Uuid,
    plies: usize,
}

impl LoggingObserver {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            plies: 0,
        }
    }

    /// Moves seen so far
    pub fn plies(&self) -> usize {
        self.plies
    }
}

impl BoardObserver for LoggingObserver {
    fn on_start(&mut self, players: &[String]) {
        self.plies = 0;
        info!(session_id = %self.session_id, players = ?players, "Game started");
    }

    fn on_move(&mut self, mv: &Move) {
        self.plies += 1;
        info!(
            session_id = %self.session_id,
            ply = self.plies,
            marble = %mv.marble(),
            position = mv.position(),
            rotation = mv.rotation(),
            "Move played"
        );
    }

    fn on_winner(&mut self, name: &str) {
        info!(session_id = %self.session_id, winner = %name, "Game won");
    }

    fn on_draw(&mut self) {
        info!(session_id = %self.session_id, "Game drawn");
    }

    fn on_disconnect(&mut self, name: &str) {
        info!(session_id = %self.session_id, player = %name, "Player disconnected");
    }

    fn on_close(&mut self) {
        info!(session_id = %self.session_id, plies = self.plies, "Session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marble::Marble;

    #[test]
    fn test_logging_observer_counts_plies() {
        let mut observer = LoggingObserver::new(Uuid::new_v4());
        observer.on_start(&["a".into(), "b".into()]);
        observer.on_move(&Move::new(0, 0, Marble::Black));
        observer.on_move(&Move::new(1, 0, Marble::White));
        observer.on_draw();
        observer.on_close();
        assert_eq!(observer.plies(), 2);
    }
}
