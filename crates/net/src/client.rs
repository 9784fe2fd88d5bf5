//! TCP client for connecting to a Pentago server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pentago_core::{Board, BoardObserver, GameResult, Marble, Move, Strategy, CELLS, ROTATIONS};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::{write_line, LineReader};
use crate::protocol::{negotiate, Direction, Expansion, Message, DELIMITER};
use crate::state::ConnectionState;

/// Event received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Paired into a game; `marble` is the colour this client plays
    GameStarted {
        black: String,
        white: String,
        marble: Marble,
    },
    /// A move was applied to the mirrored board
    MovePlayed(Move),
    GameOver(GameResult),
    UserList(Vec<String>),
    /// Round trip of a PING sent with [`Client::ping`]
    Pong(Duration),
    /// ERROR line from the server
    ServerError(String),
    AlreadyLoggedIn,
    /// Connection lost
    Disconnected,
}

/// Client handle for network operations
pub struct Client {
    state: Arc<RwLock<ClientState>>,
    event_rx: mpsc::UnboundedReceiver<ClientEvent>,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

struct ClientState {
    phase: ConnectionState,
    connected: bool,
    server_description: String,
    expansions: Vec<Expansion>,
    username: Option<String>,
    in_queue: bool,
}

enum ClientCommand {
    Send(Message),
    Login {
        username: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetAi(Option<Box<dyn Strategy>>),
    Ping,
    Hint(oneshot::Sender<Option<Move>>),
    Quit,
}

impl Client {
    /// Connect and perform the HELLO handshake
    pub async fn connect(addr: SocketAddr, description: &str) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = LineReader::new(reader);

        let ours: Vec<Expansion> = Vec::new();
        let hello = Message::Hello {
            description: description.to_string(),
            expansions: ours.clone(),
        };
        write_line(&mut writer, &hello.encode()?).await?;

        // Wait for the server's HELLO
        let reply = loop {
            let line = reader.next_line().await?;
            if !line.is_empty() {
                break Message::decode(&line, Direction::ToClient)?;
            }
        };
        let (server_description, expansions) = match reply {
            Message::Hello {
                description,
                expansions,
            } => (description, negotiate(&ours, &expansions)),
            Message::Error { description } => return Err(Error::Rejected(description)),
            other => {
                return Err(Error::InvalidMessage(format!(
                    "Expected HELLO, got {}",
                    other.kind().token()
                )))
            }
        };
        info!(server = %server_description, "Handshake complete");

        let state = Arc::new(RwLock::new(ClientState {
            phase: ConnectionState::NotLoggedIn,
            connected: true,
            server_description,
            expansions,
            username: None,
            in_queue: false,
        }));

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        // Spawn connection handler
        let conn = Connection {
            state: state.clone(),
            events: event_tx,
            pending_login: None,
            ping_sent: None,
            ai: None,
            game: None,
        };
        tokio::spawn(connection_task(reader, writer, conn, cmd_rx));

        Ok(Client {
            state,
            event_rx,
            cmd_tx,
        })
    }

    /// Get the next server event
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.event_rx.recv().await
    }

    /// Claim a username. Resolves when the server accepts or refuses it.
    pub async fn login(&self, username: &str) -> Result<()> {
        if username.is_empty() || username.contains(DELIMITER) {
            return Err(Error::UnavailableUsername(
                "Username contradicts server protocol".into(),
            ));
        }
        match self.state().await {
            ConnectionState::NotLoggedIn => {}
            ConnectionState::Connecting => {
                return Err(Error::WrongState("Client is not initialized".into()))
            }
            ConnectionState::LoggedIn | ConnectionState::InGame => {
                return Err(Error::WrongState("Client is already logged in".into()))
            }
        }

        let (reply, response) = oneshot::channel();
        self.command(ClientCommand::Login {
            username: username.to_string(),
            reply,
        })
        .await?;
        response.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Ask for the online users; the answer arrives as [`ClientEvent::UserList`]
    pub async fn list_users(&self) -> Result<()> {
        self.state().await.require_logged_in()?;
        self.send(Message::ListRequest).await
    }

    /// Toggle queue membership. Returns whether the client is now queued.
    pub async fn play(&self) -> Result<bool> {
        let queued = {
            let mut s = self.state.write().await;
            s.phase.require_logged_in()?;
            if s.phase == ConnectionState::InGame {
                return Err(Error::WrongState("Client is already playing".into()));
            }
            s.in_queue = !s.in_queue;
            s.in_queue
        };
        self.send(Message::JoinQueue).await?;
        Ok(queued)
    }

    /// Queue with `strategy` answering this client's turns for one game
    pub async fn play_with(&self, strategy: Box<dyn Strategy>) -> Result<()> {
        {
            let s = self.state.read().await;
            s.phase.require_logged_in()?;
            if s.phase == ConnectionState::InGame {
                return Err(Error::WrongState("Client is already playing".into()));
            }
        }
        info!(strategy = strategy.name(), "Playing with AI");
        self.command(ClientCommand::SetAi(Some(strategy))).await?;
        if !self.in_queue().await {
            self.play().await?;
        }
        Ok(())
    }

    /// Submit a move in the running game
    pub async fn play_move(&self, position: usize, rotation: usize) -> Result<()> {
        if self.state().await != ConnectionState::InGame {
            return Err(Error::WrongState("Client is not playing".into()));
        }
        if position >= CELLS {
            return Err(Error::InvalidMove(format!("Invalid position {position}")));
        }
        if rotation >= ROTATIONS {
            return Err(Error::InvalidMove(format!("Invalid rotation {rotation}")));
        }
        self.send(Message::Move { position, rotation }).await
    }

    /// A random legal move on the mirrored board
    pub async fn move_hint(&self) -> Result<Option<Move>> {
        if self.state().await != ConnectionState::InGame {
            return Err(Error::WrongState("Client is not playing".into()));
        }
        let (reply, response) = oneshot::channel();
        self.command(ClientCommand::Hint(reply)).await?;
        response.await.map_err(|_| Error::NotConnected)
    }

    /// Send a ping; the round trip arrives as [`ClientEvent::Pong`]
    pub async fn ping(&self) -> Result<()> {
        self.command(ClientCommand::Ping).await
    }

    /// Send QUIT and close the connection
    pub async fn quit(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Quit).await;
    }

    /// Get current connection phase
    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.phase
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.connected
    }

    pub async fn in_queue(&self) -> bool {
        self.state.read().await.in_queue
    }

    /// Expansions both ends support
    pub async fn expansions(&self) -> Vec<Expansion> {
        self.state.read().await.expansions.clone()
    }

    pub async fn server_description(&self) -> String {
        self.state.read().await.server_description.clone()
    }

    pub async fn username(&self) -> Option<String> {
        self.state.read().await.username.clone()
    }

    async fn send(&self, msg: Message) -> Result<()> {
        self.command(ClientCommand::Send(msg)).await
    }

    async fn command(&self, cmd: ClientCommand) -> Result<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| Error::NotConnected)
    }
}

/// Mirrors the server's board for one game and turns its events into
/// [`ClientEvent`]s.
struct ClientBoardObserver {
    board: Board,
    marble: Marble,
    events: mpsc::UnboundedSender<ClientEvent>,
}

impl ClientBoardObserver {
    fn new(marble: Marble, events: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self {
            board: Board::new(),
            marble,
            events,
        }
    }

    fn board(&self) -> &Board {
        &self.board
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

impl BoardObserver for ClientBoardObserver {
    fn on_start(&mut self, players: &[String]) {
        self.board.reset();
        if let [black, white] = players {
            self.emit(ClientEvent::GameStarted {
                black: black.clone(),
                white: white.clone(),
                marble: self.marble,
            });
        }
    }

    fn on_move(&mut self, mv: &Move) {
        self.board.play_move(*mv);
        self.emit(ClientEvent::MovePlayed(*mv));
    }

    fn on_winner(&mut self, name: &str) {
        self.emit(ClientEvent::GameOver(GameResult::Victory {
            winner: name.to_string(),
        }));
    }

    fn on_draw(&mut self) {
        self.emit(ClientEvent::GameOver(GameResult::Draw));
    }

    fn on_disconnect(&mut self, name: &str) {
        self.emit(ClientEvent::GameOver(GameResult::Disconnect {
            player: name.to_string(),
        }));
    }

    fn on_close(&mut self) {
        debug!(marbles = CELLS - self.board.empty_fields().len(), "Mirrored game closed");
    }
}

struct PendingLogin {
    username: String,
    reply: oneshot::Sender<Result<()>>,
}

/// State owned by the connection task
struct Connection {
    state: Arc<RwLock<ClientState>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    pending_login: Option<PendingLogin>,
    ping_sent: Option<Instant>,
    /// Answers this client's turns for the current game
    ai: Option<Box<dyn Strategy>>,
    game: Option<ClientBoardObserver>,
}

/// Main connection task
async fn connection_task(
    mut reader: LineReader<ReadHalf<TcpStream>>,
    mut writer: WriteHalf<TcpStream>,
    mut conn: Connection,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    loop {
        tokio::select! {
            // Incoming line from server
            result = reader.next_line() => {
                let reply = match result {
                    Ok(line) if line.is_empty() => None,
                    Ok(line) => {
                        debug!(line = %line, "Incoming");
                        conn.handle_line(&line).await
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!("Server closed connection");
                        break;
                    }
                    Err(e) if e.is_transport() => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                    Err(e) => Some(Message::error(e.to_string())),
                };
                if let Some(msg) = reply {
                    if let Err(e) = send_message(&mut writer, &msg).await {
                        warn!(error = %e, "Write error");
                        break;
                    }
                }
            }

            // Outgoing command
            cmd = cmd_rx.recv() => {
                let msg = match cmd {
                    Some(ClientCommand::Send(msg)) => Some(msg),
                    Some(ClientCommand::Login { username, reply }) => {
                        if conn.pending_login.is_some() {
                            let pending = Error::WrongState("Login already pending".into());
                            let _ = reply.send(Err(pending));
                            None
                        } else {
                            let msg = Message::Login { username: username.clone() };
                            conn.pending_login = Some(PendingLogin { username, reply });
                            Some(msg)
                        }
                    }
                    Some(ClientCommand::SetAi(ai)) => {
                        conn.ai = ai;
                        None
                    }
                    Some(ClientCommand::Ping) => {
                        if conn.ping_sent.is_some() {
                            debug!("Ping already outstanding");
                            None
                        } else {
                            conn.ping_sent = Some(Instant::now());
                            Some(Message::Ping)
                        }
                    }
                    Some(ClientCommand::Hint(reply)) => {
                        let hint = conn
                            .game
                            .as_ref()
                            .and_then(|game| game.board().possible_move(&mut rand::thread_rng()));
                        let _ = reply.send(hint);
                        None
                    }
                    Some(ClientCommand::Quit) => {
                        let _ = send_message(&mut writer, &Message::Quit).await;
                        debug!("Quit requested");
                        break;
                    }
                    None => {
                        debug!("Client handle dropped");
                        break;
                    }
                };
                if let Some(msg) = msg {
                    if let Err(e) = send_message(&mut writer, &msg).await {
                        warn!(error = %e, "Write error");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup
    {
        let mut s = conn.state.write().await;
        s.connected = false;
        s.in_queue = false;
    }
    if let Some(pending) = conn.pending_login.take() {
        let _ = pending.reply.send(Err(Error::ConnectionClosed));
    }
    let _ = conn.events.send(ClientEvent::Disconnected);
    info!("Disconnected from server");
}

async fn send_message(writer: &mut WriteHalf<TcpStream>, msg: &Message) -> Result<()> {
    let line = msg.encode()?;
    debug!(line = %line, "Outgoing");
    write_line(writer, &line).await
}

impl Connection {
    /// Handle one line from the server, returning the reply to send back
    async fn handle_line(&mut self, line: &str) -> Option<Message> {
        let result = match Message::decode(line, Direction::ToClient) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, line = %line, "Rejected server message");
                Some(Message::error(e.to_string()))
            }
        }
    }

    async fn handle_message(&mut self, msg: Message) -> Result<Option<Message>> {
        match msg {
            Message::LoginAccepted => {
                let Some(pending) = self.pending_login.take() else {
                    warn!("LOGIN reply without a pending login");
                    return Ok(None);
                };
                let result = {
                    let mut s = self.state.write().await;
                    let result = s.phase.transition(ConnectionState::LoggedIn);
                    if result.is_ok() {
                        s.username = Some(pending.username.clone());
                    }
                    result
                };
                if result.is_ok() {
                    info!(user = %pending.username, "Logged in");
                }
                let _ = pending.reply.send(result);
            }
            Message::AlreadyLoggedIn => {
                if let Some(pending) = self.pending_login.take() {
                    let _ = pending
                        .reply
                        .send(Err(Error::WrongState("Client is already logged in".into())));
                }
                self.emit(ClientEvent::AlreadyLoggedIn);
            }
            Message::UserList { users } => self.emit(ClientEvent::UserList(users)),
            Message::NewGame { black, white } => {
                let marble = {
                    let mut s = self.state.write().await;
                    s.phase.transition(ConnectionState::InGame)?;
                    s.in_queue = false;
                    match s.username.as_deref() {
                        Some(name) if name == black => Marble::Black,
                        Some(name) if name == white => Marble::White,
                        _ => Marble::Empty,
                    }
                };
                info!(black = %black, white = %white, marble = %marble, "Game started");

                let mut game = ClientBoardObserver::new(marble, self.events.clone());
                game.on_start(&[black, white]);
                self.game = Some(game);
                return Ok(self.ai_move());
            }
            Message::Move { position, rotation } => {
                let game = self
                    .game
                    .as_mut()
                    .ok_or_else(|| Error::WrongState("Client is not playing".into()))?;
                let mv = Move::new(position, rotation, game.board().turn());
                if !game.board().is_valid_move(&mv) {
                    return Err(Error::InvalidMove(format!(
                        "Illegal move {position} {rotation}"
                    )));
                }
                game.on_move(&mv);
                return Ok(self.ai_move());
            }
            Message::GameOver(result) => {
                let mut game = self
                    .game
                    .take()
                    .ok_or_else(|| Error::WrongState("Client is not playing".into()))?;
                self.state
                    .write()
                    .await
                    .phase
                    .transition(ConnectionState::LoggedIn)?;
                info!(result = %result, "Game over");

                match &result {
                    GameResult::Victory { winner } => game.on_winner(winner),
                    GameResult::Draw => game.on_draw(),
                    GameResult::Disconnect { player } => game.on_disconnect(player),
                }
                game.on_close();
                // an AI plays a single game
                if let Some(ai) = self.ai.take() {
                    debug!(strategy = ai.name(), "AI player retired");
                }
            }
            Message::Ping => return Ok(Some(Message::Pong)),
            Message::Pong => match self.ping_sent.take() {
                Some(sent) => {
                    let rtt = sent.elapsed();
                    info!(rtt_ms = rtt.as_secs_f64() * 1000.0, "Ping round trip");
                    self.emit(ClientEvent::Pong(rtt));
                }
                None => debug!("Unsolicited PONG"),
            },
            Message::Error { description } => match self.pending_login.take() {
                Some(pending) => {
                    let _ = pending
                        .reply
                        .send(Err(Error::UnavailableUsername(description)));
                }
                None => {
                    {
                        // outside a game only QUEUE can be refused
                        let mut s = self.state.write().await;
                        if s.in_queue && s.phase == ConnectionState::LoggedIn {
                            s.in_queue = false;
                        }
                    }
                    warn!(description = %description, "Server reported an error");
                    self.emit(ClientEvent::ServerError(description));
                }
            },
            other => {
                return Err(Error::WrongState(format!(
                    "Unexpected {} message",
                    other.kind().token()
                )));
            }
        }
        Ok(None)
    }

    /// The AI's move, if it holds the turn
    fn ai_move(&mut self) -> Option<Message> {
        let game = self.game.as_ref()?;
        let strategy = self.ai.as_mut()?;
        let board = game.board();
        if board.turn() != game.marble || board.is_game_over() {
            return None;
        }
        match strategy.decide_move(board) {
            Some(mv) => {
                debug!(
                    strategy = strategy.name(),
                    position = mv.position(),
                    rotation = mv.rotation(),
                    "AI move"
                );
                Some(Message::Move {
                    position: mv.position(),
                    rotation: mv.rotation(),
                })
            }
            None => {
                warn!(strategy = strategy.name(), "AI found no move");
                None
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
