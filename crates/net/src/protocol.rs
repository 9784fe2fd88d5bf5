//! Wire protocol messages
//!
//! One message per line: a type token followed by `~` separated arguments,
//! e.g. `MOVE~31~7`. Arguments may not contain the delimiter or a newline.

use std::fmt;

use pentago_core::{GameResult, CELLS, ROTATIONS};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Field delimiter
pub const DELIMITER: char = '~';

/// Which end a line is travelling to. LOGIN and LIST carry different
/// arguments in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToServer,
    ToClient,
}

/// Message kinds and their wire tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Init,
    Login,
    AlreadyLoggedIn,
    ListUsers,
    JoinQueue,
    MakeMove,
    NewGame,
    GameOver,
    Ping,
    Pong,
    Quit,
    Error,
}

impl MessageKind {
    pub const ALL: [MessageKind; 12] = [
        MessageKind::Init,
        MessageKind::Login,
        MessageKind::AlreadyLoggedIn,
        MessageKind::ListUsers,
        MessageKind::JoinQueue,
        MessageKind::MakeMove,
        MessageKind::NewGame,
        MessageKind::GameOver,
        MessageKind::Ping,
        MessageKind::Pong,
        MessageKind::Quit,
        MessageKind::Error,
    ];

    pub fn token(self) -> &'static str {
        match self {
            MessageKind::Init => "HELLO",
            MessageKind::Login => "LOGIN",
            MessageKind::AlreadyLoggedIn => "ALREADYLOGGEDIN",
            MessageKind::ListUsers => "LIST",
            MessageKind::JoinQueue => "QUEUE",
            MessageKind::MakeMove => "MOVE",
            MessageKind::NewGame => "NEWGAME",
            MessageKind::GameOver => "GAMEOVER",
            MessageKind::Ping => "PING",
            MessageKind::Pong => "PONG",
            MessageKind::Quit => "QUIT",
            MessageKind::Error => "ERROR",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.token() == token)
    }
}

/// Optional protocol capabilities negotiated at HELLO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Expansion {
    Auth,
    Crypt,
    Chat,
    Rank,
}

impl Expansion {
    pub fn token(self) -> &'static str {
        match self {
            Expansion::Auth => "AUTH",
            Expansion::Crypt => "CRYPT",
            Expansion::Chat => "CHAT",
            Expansion::Rank => "RANK",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "AUTH" => Some(Expansion::Auth),
            "CRYPT" => Some(Expansion::Crypt),
            "CHAT" => Some(Expansion::Chat),
            "RANK" => Some(Expansion::Rank),
            _ => None,
        }
    }
}

/// Expansions both sides advertised, in a stable order
pub fn negotiate(ours: &[Expansion], theirs: &[Expansion]) -> Vec<Expansion> {
    let mut shared: Vec<Expansion> = ours
        .iter()
        .copied()
        .filter(|e| theirs.contains(e))
        .collect();
    shared.sort();
    shared.dedup();
    shared
}

const RESULT_DISCONNECT: &str = "DISCONNECT";
const RESULT_VICTORY: &str = "VICTORY";
const RESULT_DRAW: &str = "DRAW";

/// Protocol messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Handshake, sent by the client first and echoed by the server
    Hello {
        description: String,
        expansions: Vec<Expansion>,
    },

    /// Client claims a username
    Login { username: String },

    /// Server accepted the login
    LoginAccepted,

    /// Login received on an already logged in connection
    AlreadyLoggedIn,

    /// Client asks for the online users
    ListRequest,

    /// Server answer to [`Message::ListRequest`]
    UserList { users: Vec<String> },

    /// Toggle membership in the matchmaking queue
    JoinQueue,

    /// A move, either submitted by a player or broadcast by the server
    Move { position: usize, rotation: usize },

    /// A game started between `black` and `white`
    NewGame { black: String, white: String },

    GameOver(GameResult),

    Ping,
    Pong,
    Quit,

    Error { description: String },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Hello { .. } => MessageKind::Init,
            Message::Login { .. } | Message::LoginAccepted => MessageKind::Login,
            Message::AlreadyLoggedIn => MessageKind::AlreadyLoggedIn,
            Message::ListRequest | Message::UserList { .. } => MessageKind::ListUsers,
            Message::JoinQueue => MessageKind::JoinQueue,
            Message::Move { .. } => MessageKind::MakeMove,
            Message::NewGame { .. } => MessageKind::NewGame,
            Message::GameOver(_) => MessageKind::GameOver,
            Message::Ping => MessageKind::Ping,
            Message::Pong => MessageKind::Pong,
            Message::Quit => MessageKind::Quit,
            Message::Error { .. } => MessageKind::Error,
        }
    }

    /// Shorthand for an ERROR reply
    pub fn error(description: impl Into<String>) -> Self {
        Message::Error {
            description: description.into(),
        }
    }

    /// Encode to a single line, without the trailing newline
    pub fn encode(&self) -> Result<String> {
        let numbers;
        let mut args: Vec<&str> = Vec::new();
        match self {
            Message::Hello {
                description,
                expansions,
            } => {
                args.push(description);
                args.extend(expansions.iter().map(|e| e.token()));
            }
            Message::Login { username } => args.push(username),
            Message::UserList { users } => args.extend(users.iter().map(String::as_str)),
            Message::Move { position, rotation } => {
                numbers = [position.to_string(), rotation.to_string()];
                args.extend(numbers.iter().map(String::as_str));
            }
            Message::NewGame { black, white } => {
                args.push(black);
                args.push(white);
            }
            Message::GameOver(result) => match result {
                GameResult::Victory { winner } => {
                    args.push(RESULT_VICTORY);
                    args.push(winner);
                }
                GameResult::Draw => args.push(RESULT_DRAW),
                GameResult::Disconnect { player } => {
                    args.push(RESULT_DISCONNECT);
                    args.push(player);
                }
            },
            Message::Error { description } => args.push(description),
            Message::LoginAccepted
            | Message::AlreadyLoggedIn
            | Message::ListRequest
            | Message::JoinQueue
            | Message::Ping
            | Message::Pong
            | Message::Quit => {}
        }
        encode_raw(self.kind(), &args)
    }

    /// Decode one line travelling in `direction`
    pub fn decode(line: &str, direction: Direction) -> Result<Self> {
        let mut parts = line.split(DELIMITER);
        let token = parts.next().unwrap_or_default();
        let kind = MessageKind::from_token(token)
            .ok_or_else(|| Error::UnknownMessage(token.to_string()))?;
        let args: Vec<&str> = parts.collect();

        let message = match kind {
            MessageKind::Init => {
                let (description, tokens) = args
                    .split_first()
                    .ok_or_else(|| arity(kind, "a description"))?;
                let expansions = tokens
                    .iter()
                    .map(|t| {
                        Expansion::from_token(t)
                            .ok_or_else(|| Error::InvalidMessage(format!("Illegal expansion {t}")))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Message::Hello {
                    description: description.to_string(),
                    expansions,
                }
            }
            MessageKind::Login => match direction {
                Direction::ToServer => {
                    let [username] = exact::<1>(kind, &args)?;
                    Message::Login {
                        username: username.to_string(),
                    }
                }
                Direction::ToClient => {
                    exact::<0>(kind, &args)?;
                    Message::LoginAccepted
                }
            },
            MessageKind::ListUsers => match direction {
                Direction::ToServer => {
                    exact::<0>(kind, &args)?;
                    Message::ListRequest
                }
                Direction::ToClient => Message::UserList {
                    users: args.iter().map(|s| s.to_string()).collect(),
                },
            },
            MessageKind::MakeMove => {
                let [position, rotation] = exact::<2>(kind, &args)?;
                let position = parse_number(position, "position")?;
                let rotation = parse_number(rotation, "rotation")?;
                if !(0..CELLS as i64).contains(&position) {
                    return Err(Error::InvalidMove(format!("Invalid position {position}")));
                }
                if !(0..ROTATIONS as i64).contains(&rotation) {
                    return Err(Error::InvalidMove(format!("Invalid rotation {rotation}")));
                }
                Message::Move {
                    position: position as usize,
                    rotation: rotation as usize,
                }
            }
            MessageKind::NewGame => {
                let [black, white] = exact::<2>(kind, &args)?;
                Message::NewGame {
                    black: black.to_string(),
                    white: white.to_string(),
                }
            }
            MessageKind::GameOver => Message::GameOver(decode_result(&args)?),
            MessageKind::Error => {
                let [description] = exact::<1>(kind, &args)?;
                Message::Error {
                    description: description.to_string(),
                }
            }
            MessageKind::AlreadyLoggedIn => {
                exact::<0>(kind, &args)?;
                Message::AlreadyLoggedIn
            }
            MessageKind::JoinQueue => {
                exact::<0>(kind, &args)?;
                Message::JoinQueue
            }
            MessageKind::Ping => {
                exact::<0>(kind, &args)?;
                Message::Ping
            }
            MessageKind::Pong => {
                exact::<0>(kind, &args)?;
                Message::Pong
            }
            MessageKind::Quit => {
                exact::<0>(kind, &args)?;
                Message::Quit
            }
        };
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.encode() {
            Ok(line) => f.write_str(&line),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// Join a token and its arguments. Fails if an argument contains the
/// delimiter or a line break.
pub fn encode_raw(kind: MessageKind, args: &[&str]) -> Result<String> {
    let mut line = String::from(kind.token());
    for arg in args {
        if arg.contains(DELIMITER) || arg.contains('\n') || arg.contains('\r') {
            return Err(Error::Encoding(format!(
                "{} argument {:?} contains a reserved character",
                kind.token(),
                arg
            )));
        }
        line.push(DELIMITER);
        line.push_str(arg);
    }
    Ok(line)
}

fn arity(kind: MessageKind, expected: &str) -> Error {
    Error::InvalidMessage(format!("{} expects {}", kind.token(), expected))
}

fn exact<'a, const N: usize>(kind: MessageKind, args: &[&'a str]) -> Result<[&'a str; N]> {
    <[&str; N]>::try_from(args).map_err(|_| {
        Error::InvalidMessage(format!(
            "{} expects {} argument(s), got {}",
            kind.token(),
            N,
            args.len()
        ))
    })
}

fn parse_number(value: &str, field: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| Error::InvalidMessage(format!("{field} is not a number: {value:?}")))
}

fn decode_result(args: &[&str]) -> Result<GameResult> {
    let kind = MessageKind::GameOver;
    match args {
        [RESULT_DRAW] => Ok(GameResult::Draw),
        [RESULT_VICTORY, winner] => Ok(GameResult::Victory {
            winner: winner.to_string(),
        }),
        [RESULT_DISCONNECT, player] => Ok(GameResult::Disconnect {
            player: player.to_string(),
        }),
        [RESULT_DRAW, ..] => Err(arity(kind, "no player for DRAW")),
        [RESULT_VICTORY | RESULT_DISCONNECT, ..] => Err(arity(kind, "exactly one player")),
        [other, ..] => Err(Error::InvalidMessage(format!("Unknown game result {other}"))),
        [] => Err(arity(kind, "a result")),
    }
}
