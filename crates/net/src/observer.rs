//! Forwards session events to a connection

use pentago_core::{BoardObserver, GameResult, GameSession, Move};
use tracing::debug;
use uuid::Uuid;

use crate::lobby::Peer;
use crate::protocol::Message;
use crate::state::ConnectionState;

/// Server-side observer for one seated connection.
///
/// Sends NEWGAME, MOVE and GAMEOVER lines, and returns the connection to
/// the logged in phase when the game ends.
pub struct NetworkObserver {
    peer: Peer,
    session_id: Uuid,
}

impl NetworkObserver {
    /// Observer for `peer` seated in the session `session_id`
    pub fn new(peer: Peer, session_id: Uuid) -> Self {
        Self { peer, session_id }
    }

    fn send(&self, msg: Message) {
        if !self.peer.send(msg) {
            debug!(peer = %self.peer.id(), "Connection gone, dropping game event");
        }
    }

    /// Leave the game before GAMEOVER goes out, so the client can queue
    /// again as soon as it reads it. A no-op once the connection sits in
    /// another session.
    fn finish(&self) {
        let mut state = self.peer.state();
        if state.session.as_ref().map(GameSession::id) != Some(self.session_id) {
            return;
        }
        if state.phase == ConnectionState::InGame {
            state.phase = ConnectionState::LoggedIn;
        }
        state.session = None;
    }

    fn game_over(&self, result: GameResult) {
        self.finish();
        self.send(Message::GameOver(result));
    }
}

impl BoardObserver for NetworkObserver {
    fn on_start(&mut self, players: &[String]) {
        let [black, white] = players else {
            debug!(count = players.len(), "Unexpected player count at start");
            return;
        };
        self.send(Message::NewGame {
            black: black.clone(),
            white: white.clone(),
        });
    }

    fn on_move(&mut self, mv: &Move) {
        self.send(Message::Move {
            position: mv.position(),
            rotation: mv.rotation(),
        });
    }

    fn on_winner(&mut self, name: &str) {
        self.game_over(GameResult::Victory {
            winner: name.to_string(),
        });
    }

    fn on_draw(&mut self) {
        self.game_over(GameResult::Draw);
    }

    fn on_disconnect(&mut self, name: &str) {
        self.game_over(GameResult::Disconnect {
            player: name.to_string(),
        });
    }

    fn on_close(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pentago_core::Marble;
    use tokio::sync::mpsc;

    #[test]
    fn test_events_become_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = Peer::new(tx);
        let session = GameSession::new();
        {
            let mut state = peer.state();
            state.phase = ConnectionState::InGame;
            state.session = Some(session.clone());
        }
        let mut observer = NetworkObserver::new(peer.clone(), session.id());

        observer.on_start(&["alice".into(), "bob".into()]);
        observer.on_move(&Move::new(14, 3, Marble::Black));
        observer.on_winner("alice");
        assert_eq!(peer.state().phase, ConnectionState::LoggedIn);
        observer.on_close();

        assert_eq!(
            rx.try_recv().unwrap(),
            Message::NewGame {
                black: "alice".into(),
                white: "bob".into()
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Message::Move {
                position: 14,
                rotation: 3
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Message::GameOver(GameResult::Victory {
                winner: "alice".into()
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_close_without_result_resets_phase() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let peer = Peer::new(tx);
        let session = GameSession::new();
        {
            let mut state = peer.state();
            state.phase = ConnectionState::InGame;
            state.session = Some(session.clone());
        }
        NetworkObserver::new(peer.clone(), session.id()).on_close();
        assert_eq!(peer.state().phase, ConnectionState::LoggedIn);
        assert!(peer.state().session.is_none());
    }

    #[test]
    fn test_close_leaves_newer_session_alone() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let peer = Peer::new(tx);
        let old = GameSession::new();
        let current = GameSession::new();
        {
            let mut state = peer.state();
            state.phase = ConnectionState::InGame;
            state.session = Some(current.clone());
        }
        NetworkObserver::new(peer.clone(), old.id()).on_close();
        assert_eq!(peer.state().phase, ConnectionState::InGame);
        assert_eq!(
            peer.state().session.as_ref().map(GameSession::id),
            Some(current.id())
        );
    }
}
