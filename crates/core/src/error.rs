//! Error types for Pentago Core

use thiserror::Error;

use crate::marble::Marble;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("This is not your turn")]
    NotYourTurn,

    #[error("Seat {0} is already taken")]
    SeatTaken(Marble),

    #[error("Session is full")]
    SessionFull,

    #[error("No seat for marble {0}")]
    NoSuchSeat(Marble),

    #[error("Player {0} is already seated")]
    AlreadySeated(String),

    #[error("Unknown player: {0}")]
    UnknownPlayer(String),

    #[error("Player has no username")]
    MissingIdentity,

    #[error("Session needs two players, has {0}")]
    NotEnoughPlayers(usize),

    #[error("Session has already started")]
    AlreadyStarted,

    #[error("Session is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
