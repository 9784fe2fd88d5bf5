//! Network error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Unknown message: {0}")]
    UnknownMessage(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Cannot encode message: {0}")]
    Encoding(String),

    #[error("{0}")]
    WrongState(String),

    #[error("{0}")]
    UnavailableUsername(String),

    #[error("{0}")]
    Game(#[from] pentago_core::Error),

    #[error("Connection rejected: {0}")]
    Rejected(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Socket level failures end the connection and are never answered
    /// with an ERROR line.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_) | Error::ConnectionClosed)
    }
}
