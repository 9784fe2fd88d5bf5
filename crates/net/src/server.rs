//! TCP game server
//!
//! Every connection gets a reader loop and a writer task. Lines are decoded,
//! checked against the connection phase, and dispatched to the lobby or to
//! the connection's running game session. Errors in a request are answered
//! with an ERROR line; the connection stays open.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::frame::{write_line, LineReader};
use crate::lobby::{lock, Lobby, Peer, QueueOutcome};
use crate::protocol::{negotiate, Direction, Message};
use crate::state::ConnectionState;

/// Game server handle
pub struct Server {
    addr: SocketAddr,
    config: Arc<ServerConfig>,
    lobby: Arc<Mutex<Lobby>>,
    shutdown_tx: broadcast::Sender<()>,
}

/// What the read loop does after a request
enum Flow {
    Continue,
    Close,
}

/// Shared context for one connection
struct Connection {
    peer: Peer,
    addr: SocketAddr,
    config: Arc<ServerConfig>,
    lobby: Arc<Mutex<Lobby>>,
}

impl Server {
    /// Bind the configured address and start accepting connections
    pub async fn start(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.socket_addr()).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, description = %config.description, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let config = Arc::new(config);
        let lobby = Arc::new(Mutex::new(Lobby::new()));

        // Spawn accept loop
        tokio::spawn(accept_loop(
            listener,
            config.clone(),
            lobby.clone(),
            shutdown_tx.clone(),
        ));

        Ok(Server {
            addr: bound_addr,
            config,
            lobby,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Usernames of every logged in connection
    pub fn online_users(&self) -> Vec<String> {
        lock(&self.lobby).online_users()
    }

    /// Number of sessions still running
    pub fn running_sessions(&self) -> usize {
        lock(&self.lobby)
            .sessions()
            .iter()
            .filter(|session| session.is_running())
            .count()
    }

    /// Send PING to every connection without one outstanding.
    /// The round trip is logged when the PONG arrives.
    pub fn ping_all(&self) -> usize {
        let lobby = lock(&self.lobby);
        let mut pinged = 0;
        for peer in lobby.peers() {
            let mut state = peer.state();
            if state.ping_sent.is_some() {
                debug!(peer = %peer.id(), "Ping already outstanding");
                continue;
            }
            if peer.send(Message::Ping) {
                state.ping_sent = Some(Instant::now());
                pinged += 1;
            }
        }
        if pinged == 0 {
            info!("There are no connections to ping");
        }
        pinged
    }

    /// End all sessions, close every connection and stop accepting
    pub fn stop(&self) {
        lock(&self.lobby).close_all();
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    lobby: Arc<Mutex<Lobby>>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            config.clone(),
                            lobby.clone(),
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: Arc<ServerConfig>,
    lobby: Arc<Mutex<Lobby>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (reader, writer) = tokio::io::split(stream);

    // Spawn writer task
    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    let writer_handle = tokio::spawn(writer_task(writer, msg_rx, addr));

    let peer = Peer::new(msg_tx);
    lock(&lobby).register(peer.clone());
    let conn = Connection {
        peer,
        addr,
        config,
        lobby,
    };

    // Read loop
    let mut reader = LineReader::new(reader);
    loop {
        tokio::select! {
            result = reader.next_line() => {
                match result {
                    Ok(line) => {
                        if line.is_empty() {
                            continue;
                        }
                        debug!(addr = %addr, line = %line, "Incoming");
                        if let Flow::Close = handle_line(&line, &conn) {
                            break;
                        }
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!(addr = %addr, "Connection closed");
                        break;
                    }
                    Err(e) if e.is_transport() => {
                        warn!(addr = %addr, error = %e, "Read error");
                        break;
                    }
                    Err(e) => {
                        warn!(addr = %addr, error = %e, "Unreadable line");
                        conn.peer.send(Message::error(e.to_string()));
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!(addr = %addr, "Closing connection for shutdown");
                break;
            }
        }
    }

    // Cleanup
    writer_handle.abort();
    let username = lock(&conn.lobby).leave(conn.peer.id());

    info!(addr = %addr, user = ?username, "Peer disconnected");
}

/// Writer task - sends queued messages to the client
async fn writer_task(
    mut writer: WriteHalf<TcpStream>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    addr: SocketAddr,
) {
    while let Some(msg) = rx.recv().await {
        let line = match msg.encode() {
            Ok(line) => line,
            Err(e) => {
                warn!(addr = %addr, error = %e, "Dropping unencodable message");
                continue;
            }
        };
        debug!(addr = %addr, line = %line, "Outgoing");
        if let Err(e) = write_line(&mut writer, &line).await {
            debug!(addr = %addr, error = %e, "Write failed");
            break;
        }
    }
}

/// Decode and dispatch one line, answering errors with an ERROR line
fn handle_line(line: &str, conn: &Connection) -> Flow {
    let result = Message::decode(line, Direction::ToServer).and_then(|msg| dispatch(msg, conn));
    match result {
        Ok(flow) => flow,
        Err(e) => {
            warn!(addr = %conn.addr, error = %e, "Request rejected");
            conn.peer.send(Message::error(e.to_string()));
            Flow::Continue
        }
    }
}

/// Handle a decoded message
fn dispatch(msg: Message, conn: &Connection) -> Result<Flow> {
    let peer = &conn.peer;
    match msg {
        Message::Hello {
            description,
            expansions,
        } => {
            {
                let mut state = peer.state();
                if state.phase != ConnectionState::Connecting {
                    return Err(Error::WrongState("Client is already initialized".into()));
                }
                state.phase.transition(ConnectionState::NotLoggedIn)?;
                state.expansions = negotiate(&conn.config.expansions, &expansions);
                info!(addr = %conn.addr, client = %description, "Handshake");
                state.description = Some(description);
            }
            peer.send(Message::Hello {
                description: conn.config.description.clone(),
                expansions: conn.config.expansions.clone(),
            });
        }
        Message::Login { username } => {
            let phase = peer.state().phase;
            match phase {
                ConnectionState::Connecting => {
                    return Err(Error::WrongState("Client is not initialized".into()));
                }
                ConnectionState::LoggedIn | ConnectionState::InGame => {
                    peer.send(Message::AlreadyLoggedIn);
                }
                ConnectionState::NotLoggedIn => {
                    lock(&conn.lobby).login(peer.id(), &username)?;
                    info!(addr = %conn.addr, user = %username, "Logged in");
                    peer.send(Message::LoginAccepted);
                }
            }
        }
        Message::ListRequest => {
            peer.state().phase.require_logged_in()?;
            let users = lock(&conn.lobby).online_users();
            peer.send(Message::UserList { users });
        }
        Message::JoinQueue => {
            let outcome = lock(&conn.lobby).join_queue(peer.id())?;
            match outcome {
                QueueOutcome::Left => debug!(addr = %conn.addr, "Left the queue"),
                QueueOutcome::Waiting => debug!(addr = %conn.addr, "Waiting in the queue"),
                QueueOutcome::Started(session) => {
                    debug!(addr = %conn.addr, session_id = %session.id(), "Game started")
                }
                QueueOutcome::Dropped => {
                    return Err(Error::Rejected("Failed to join session".into()));
                }
            }
        }
        Message::Move { position, rotation } => {
            let (session, username) = {
                let state = peer.state();
                (state.session.clone(), state.username.clone())
            };
            match (session, username) {
                (Some(session), Some(username)) if session.is_running() => {
                    session.submit_move(&username, position, rotation)?;
                }
                _ => return Err(Error::WrongState("Client is not playing".into())),
            }
        }
        Message::Ping => {
            peer.send(Message::Pong);
        }
        Message::Pong => {
            if let Some(sent) = peer.state().ping_sent.take() {
                info!(
                    addr = %conn.addr,
                    rtt_ms = sent.elapsed().as_secs_f64() * 1000.0,
                    "Ping round trip"
                );
            }
        }
        Message::Quit => return Ok(Flow::Close),
        Message::Error { description } => {
            warn!(addr = %conn.addr, description = %description, "Client reported an error");
        }
        other => {
            return Err(Error::WrongState(format!(
                "Unexpected {} message",
                other.kind().token()
            )));
        }
    }
    Ok(Flow::Continue)
}
