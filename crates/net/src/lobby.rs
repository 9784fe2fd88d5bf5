//! Matchmaking queue and online registry
//!
//! The server keeps one [`Lobby`] behind a single mutex, so "check the queue,
//! pop two, seat them in a new session" happens atomically. Per-connection
//! state lives in each [`Peer`]; the lobby may lock a peer while it is held,
//! never the other way round.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use pentago_core::{BufferedPlayer, GameSession, Player};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::observer::NetworkObserver;
use crate::protocol::{Expansion, Message, DELIMITER};
use crate::state::ConnectionState;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutable state of one server-side connection
#[derive(Default)]
pub struct PeerState {
    pub phase: ConnectionState,
    pub username: Option<String>,
    /// Description the client sent in its HELLO
    pub description: Option<String>,
    /// Expansions both ends support
    pub expansions: Vec<Expansion>,
    pub session: Option<GameSession>,
    /// Outstanding PING, if any
    pub ping_sent: Option<Instant>,
}

/// Handle to one connection: its outbound queue and its state
#[derive(Clone)]
pub struct Peer {
    id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
    state: Arc<Mutex<PeerState>>,
}

impl Peer {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
            state: Arc::new(Mutex::new(PeerState::default())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a message for the writer task. Returns false once the
    /// connection is gone.
    pub fn send(&self, msg: Message) -> bool {
        self.tx.send(msg).is_ok()
    }

    pub fn state(&self) -> MutexGuard<'_, PeerState> {
        lock(&self.state)
    }

    pub fn username(&self) -> Option<String> {
        self.state().username.clone()
    }
}

/// What a QUEUE request did
#[derive(Debug)]
pub enum QueueOutcome {
    /// The connection was queued already and has left the queue
    Left,
    /// Queued, waiting for an opponent
    Waiting,
    /// Paired with the oldest waiting connection
    Started(GameSession),
    /// Pairing failed; both entries were dropped from the queue
    Dropped,
}

/// Queue, registry and running sessions
#[derive(Default)]
pub struct Lobby {
    peers: HashMap<Uuid, Peer>,
    queue: VecDeque<Uuid>,
    sessions: Vec<GameSession>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, peer: Peer) {
        self.peers.insert(peer.id(), peer);
    }

    pub fn peer(&self, id: Uuid) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Usernames of every logged in connection
    pub fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.peers.values().filter_map(Peer::username).collect();
        users.sort();
        users
    }

    /// Claim `username` for connection `id` and mark it logged in
    pub fn login(&mut self, id: Uuid, username: &str) -> Result<()> {
        if username.is_empty() || username.contains(DELIMITER) {
            return Err(Error::UnavailableUsername(
                "Username contradicts server protocol".into(),
            ));
        }
        if self.online_users().iter().any(|user| user == username) {
            return Err(Error::UnavailableUsername(
                "This username is not available".into(),
            ));
        }

        let peer = self.peers.get(&id).ok_or(Error::NotConnected)?;
        let mut state = peer.state();
        state.phase.transition(ConnectionState::LoggedIn)?;
        state.username = Some(username.to_string());
        Ok(())
    }

    pub fn is_queued(&self, id: Uuid) -> bool {
        self.queue.contains(&id)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Toggle queue membership, pairing the two oldest entries once two
    /// connections wait.
    pub fn join_queue(&mut self, id: Uuid) -> Result<QueueOutcome> {
        if let Some(index) = self.queue.iter().position(|queued| *queued == id) {
            self.queue.remove(index);
            return Ok(QueueOutcome::Left);
        }

        let peer = self.peers.get(&id).ok_or(Error::NotConnected)?;
        let phase = peer.state().phase;
        phase.require_logged_in()?;
        if phase == ConnectionState::InGame {
            return Err(Error::WrongState("Client is already playing".into()));
        }

        self.queue.push_back(id);
        if self.queue.len() < 2 {
            return Ok(QueueOutcome::Waiting);
        }

        let (Some(first), Some(second)) = (self.queue.pop_front(), self.queue.pop_front()) else {
            return Ok(QueueOutcome::Waiting);
        };
        match self.pair(first, second) {
            Ok(session) => Ok(QueueOutcome::Started(session)),
            Err(e) => {
                warn!(error = %e, "Pairing failed, dropping both queue entries");
                Ok(QueueOutcome::Dropped)
            }
        }
    }

    /// Seat two connections in a fresh session and start it
    fn pair(&mut self, first: Uuid, second: Uuid) -> Result<GameSession> {
        let black = self.peers.get(&first).cloned();
        let white = self.peers.get(&second).cloned();
        let (Some(black), Some(white)) = (black, white) else {
            return Err(Error::Rejected("Connection already left".into()));
        };

        let session = GameSession::new();
        seat(&black, &session)?;
        if let Err(e) = seat(&white, &session) {
            unseat(&black);
            return Err(e);
        }

        if let Err(e) = session.start() {
            unseat(&black);
            unseat(&white);
            return Err(e.into());
        }

        info!(
            session_id = %session.id(),
            players = ?session.players(),
            "Session paired"
        );
        self.sessions.retain(GameSession::is_running);
        self.sessions.push(session.clone());
        Ok(session)
    }

    /// Remove a connection and end any game it is part of.
    /// Returns its username if it had logged in.
    pub fn leave(&mut self, id: Uuid) -> Option<String> {
        self.queue.retain(|queued| *queued != id);
        let peer = self.peers.remove(&id)?;
        let username = peer.username();

        if let Some(name) = &username {
            for session in &self.sessions {
                if session.is_running() && session.has_player(name) {
                    session.disconnect(name);
                }
            }
        }
        self.sessions.retain(GameSession::is_running);
        username
    }

    /// Sessions that were running at the last pairing or leave
    pub fn sessions(&self) -> &[GameSession] {
        &self.sessions
    }

    /// Stop every session and empty the queue
    pub fn close_all(&mut self) {
        for session in self.sessions.drain(..) {
            session.close();
            for player in session.players() {
                session.disconnect(&player);
            }
        }
        self.queue.clear();
    }
}

fn seat(peer: &Peer, session: &GameSession) -> Result<()> {
    let username = {
        let mut state = peer.state();
        if state.phase != ConnectionState::LoggedIn {
            return Err(Error::WrongState(format!(
                "Cannot seat a connection that is {}",
                state.phase
            )));
        }
        let username = state
            .username
            .clone()
            .ok_or_else(|| Error::Rejected("Connection has no username".into()))?;

        let player = Arc::new(BufferedPlayer::new(username.clone()));
        session.join(Player::Buffered(player))?;
        state.phase.transition(ConnectionState::InGame)?;
        state.session = Some(session.clone());
        username
    };

    debug!(user = %username, session_id = %session.id(), "Seated");
    session.add_observer(Box::new(NetworkObserver::new(peer.clone(), session.id())));
    Ok(())
}

fn unseat(peer: &Peer) {
    let mut state = peer.state();
    if state.phase == ConnectionState::InGame {
        state.phase = ConnectionState::LoggedIn;
    }
    state.session = None;
}
