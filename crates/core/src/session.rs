//! Game session turn engine
//!
//! A session owns one board and two seats. Once started, it runs its turn
//! loop on a dedicated thread: ask the player whose marble is on turn for a
//! decision, apply it, fan the move out to observers, and stop on game over
//! or disconnect. Asking a buffered player blocks that thread, never the
//! caller of [`GameSession::submit_move`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::board::{Board, Move};
use crate::error::{Error, Result};
use crate::invariants::{assert_board_invariants, assert_move_by_turn};
use crate::marble::Marble;
use crate::observer::BoardObserver;
use crate::player::{BufferedPlayer, Decision, Player};
use crate::result::GameResult;

const SEATS: [Marble; 2] = [Marble::Black, Marble::White];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Public view of a filled seat
struct Seat {
    name: String,
    mailbox: Option<Arc<BufferedPlayer>>,
}

#[derive(Default)]
struct Roster {
    seats: [Option<Seat>; 2],
    /// Players waiting to be handed to the session thread
    pending: [Option<Player>; 2],
    started: bool,
}

impl Roster {
    fn seated(&self) -> usize {
        self.seats.iter().filter(|seat| seat.is_some()).count()
    }

    fn find(&self, name: &str) -> Option<(usize, &Seat)> {
        self.seats
            .iter()
            .enumerate()
            .find_map(|(i, seat)| seat.as_ref().filter(|s| s.name == name).map(|s| (i, s)))
    }
}

struct Inner {
    id: Uuid,
    board: Mutex<Board>,
    roster: Mutex<Roster>,
    observers: Mutex<Vec<Box<dyn BoardObserver>>>,
    running: AtomicBool,
    disconnected: Mutex<Option<String>>,
    result: Mutex<Option<GameResult>>,
}

/// Shared handle to one game. Cloning yields another handle to the same
/// session.
#[derive(Clone)]
pub struct GameSession {
    inner: Arc<Inner>,
}

impl GameSession {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                board: Mutex::new(Board::new()),
                roster: Mutex::new(Roster::default()),
                observers: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                disconnected: Mutex::new(None),
                result: Mutex::new(None),
            }),
        }
    }

    /// Create a session and seat `players` in order
    pub fn with_players(players: impl IntoIterator<Item = Player>) -> Result<Self> {
        let session = Self::new();
        for player in players {
            session.join(player)?;
        }
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Seat a player at the first free slot, black before white
    pub fn join(&self, player: Player) -> Result<Marble> {
        let mut roster = lock(&self.inner.roster);
        let marble = SEATS
            .into_iter()
            .find(|marble| {
                marble
                    .seat()
                    .is_some_and(|seat| roster.seats[seat].is_none())
            })
            .ok_or(Error::SessionFull)?;
        Self::seat(&mut roster, player, marble)?;
        Ok(marble)
    }

    /// Seat a player at a specific slot
    pub fn join_at(&self, player: Player, marble: Marble) -> Result<()> {
        let mut roster = lock(&self.inner.roster);
        Self::seat(&mut roster, player, marble)
    }

    fn seat(roster: &mut Roster, mut player: Player, marble: Marble) -> Result<()> {
        if roster.started {
            return Err(Error::AlreadyStarted);
        }
        if player.name().is_empty() {
            return Err(Error::MissingIdentity);
        }
        let index = marble.seat().ok_or(Error::NoSuchSeat(marble))?;
        if roster.seats[index].is_some() {
            return Err(Error::SeatTaken(marble));
        }
        if roster.find(player.name()).is_some() || !player.assign_turn(marble) {
            return Err(Error::AlreadySeated(player.name().to_string()));
        }

        let mailbox = match &player {
            Player::Buffered(buffered) => Some(Arc::clone(buffered)),
            Player::Ai(_) => None,
        };
        debug!(player = %player.name(), seat = %marble, "Player seated");
        roster.seats[index] = Some(Seat {
            name: player.name().to_string(),
            mailbox,
        });
        roster.pending[index] = Some(player);
        Ok(())
    }

    pub fn add_observer(&self, observer: Box<dyn BoardObserver>) {
        lock(&self.inner.observers).push(observer);
    }

    /// Hand both players to a new session thread and run the game.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        let players = {
            let mut roster = lock(&self.inner.roster);
            if roster.started {
                return Err(Error::AlreadyStarted);
            }
            if roster.pending.iter().any(Option::is_none) {
                return Err(Error::NotEnoughPlayers(roster.seated()));
            }
            let [Some(black), Some(white)] = std::mem::take(&mut roster.pending) else {
                return Err(Error::NotEnoughPlayers(0));
            };
            roster.started = true;
            [black, white]
        };

        self.inner.running.store(true, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name(format!("session-{}", self.inner.id.simple()))
            .spawn(move || run(&inner, players));

        handle.map_err(|e| {
            self.inner.running.store(false, Ordering::SeqCst);
            Error::Io(e)
        })
    }

    /// Validate a move for `player` and buffer it for the session thread.
    ///
    /// Never blocks on the turn loop. Rejected moves are not buffered.
    pub fn submit_move(&self, player: &str, position: usize, rotation: usize) -> Result<Move> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }

        let (marble, mailbox) = {
            let roster = lock(&self.inner.roster);
            let (index, seat) = roster
                .find(player)
                .ok_or_else(|| Error::UnknownPlayer(player.to_string()))?;
            let mailbox = seat.mailbox.clone().ok_or(Error::NotYourTurn)?;
            (SEATS[index], mailbox)
        };

        let board = lock(&self.inner.board);
        if board.turn() != marble {
            return Err(Error::NotYourTurn);
        }
        let mv = Move::new(position, rotation, marble);
        if !board.is_valid_move(&mv) {
            return Err(Error::InvalidMove(format!(
                "position {position} rotation {rotation}"
            )));
        }
        mailbox.store_move(mv);
        Ok(mv)
    }

    /// End the game because `name` left. Wakes a thread blocked on any
    /// buffered player. Returns false if `name` is not seated here.
    pub fn disconnect(&self, name: &str) -> bool {
        let roster = lock(&self.inner.roster);
        if roster.find(name).is_none() {
            return false;
        }

        lock(&self.inner.disconnected).get_or_insert_with(|| name.to_string());
        for seat in roster.seats.iter().flatten() {
            if let Some(mailbox) = &seat.mailbox {
                mailbox.signal_disconnect();
            }
        }
        info!(session_id = %self.inner.id, player = %name, "Disconnect signalled");
        true
    }

    /// Stop before the next turn. A turn already waiting on a buffered
    /// player is not interrupted.
    pub fn close(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    pub fn has_player(&self, name: &str) -> bool {
        lock(&self.inner.roster).find(name).is_some()
    }

    /// Names in seat order
    pub fn players(&self) -> Vec<String> {
        lock(&self.inner.roster)
            .seats
            .iter()
            .flatten()
            .map(|seat| seat.name.clone())
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn turn(&self) -> Marble {
        lock(&self.inner.board).turn()
    }

    pub fn is_valid_move(&self, mv: &Move) -> bool {
        lock(&self.inner.board).is_valid_move(mv)
    }

    /// Snapshot of the current board
    pub fn board(&self) -> Board {
        lock(&self.inner.board).deep_copy()
    }

    /// Final outcome, once the loop has ended with one
    pub fn result(&self) -> Option<GameResult> {
        lock(&self.inner.result).clone()
    }
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.inner.id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn notify(&self, event: impl Fn(&mut dyn BoardObserver)) {
        for observer in lock(&self.observers).iter_mut() {
            event(observer.as_mut());
        }
    }

    fn disconnected(&self) -> Option<String> {
        lock(&self.disconnected).clone()
    }
}

fn run(inner: &Inner, mut players: [Player; 2]) {
    let names: Vec<String> = players.iter().map(|p| p.name().to_string()).collect();
    info!(session_id = %inner.id, black = %names[0], white = %names[1], "Session started");
    inner.notify(|o| o.on_start(&names));

    let result = loop {
        if let Some(name) = inner.disconnected() {
            break Some(GameResult::Disconnect { player: name });
        }
        if !inner.running.load(Ordering::SeqCst) {
            break None;
        }

        let snapshot = lock(&inner.board).deep_copy();
        let Some(index) = snapshot.turn().seat() else {
            break None;
        };
        let decision = players[index].decide(&snapshot);

        // a disconnect overrides whatever the turn produced
        if let Some(name) = inner.disconnected() {
            break Some(GameResult::Disconnect { player: name });
        }

        let mv = match decision {
            Decision::Move(mv) => mv,
            Decision::Disconnected => {
                break Some(GameResult::Disconnect {
                    player: names[index].clone(),
                })
            }
        };

        let after = {
            let mut board = lock(&inner.board);
            if mv.marble() != board.turn() || !board.is_valid_move(&mv) {
                warn!(session_id = %inner.id, player = %names[index], ?mv, "Ignoring illegal move");
                continue;
            }
            assert_move_by_turn(&board, mv.marble());
            board.play_move(mv);
            assert_board_invariants(&board);
            board.deep_copy()
        };
        inner.notify(|o| o.on_move(&mv));

        let outcome = GameResult::from_board(&after, |marble| {
            marble
                .seat()
                .map(|i| names[i].clone())
                .unwrap_or_default()
        });
        if outcome.is_some() {
            break outcome;
        }
    };

    inner.running.store(false, Ordering::SeqCst);
    if let Some(result) = &result {
        info!(session_id = %inner.id, result = %result, "Game over");
        inner.notify(|o| match result {
            GameResult::Victory { winner } => o.on_winner(winner),
            GameResult::Draw => o.on_draw(),
            GameResult::Disconnect { player } => o.on_disconnect(player),
        });
    }
    *lock(&inner.result) = result;
    inner.notify(|o| o.on_close());
    debug!(session_id = %inner.id, "Session thread finished");
}
