//! Connection phases shared by client and server

use std::fmt;

use crate::error::{Error, Result};

/// Phase of one connection, tracked identically on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Socket open, handshake not finished
    #[default]
    Connecting,
    NotLoggedIn,
    LoggedIn,
    InGame,
}

impl ConnectionState {
    /// Whether `self -> to` is one of the four legal edges
    pub fn can_transition(self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            (Connecting, NotLoggedIn)
                | (NotLoggedIn, LoggedIn)
                | (LoggedIn, InGame)
                | (InGame, LoggedIn)
        )
    }

    /// Move to `to`, or fail without changing anything
    pub fn transition(&mut self, to: ConnectionState) -> Result<()> {
        if !self.can_transition(to) {
            return Err(Error::WrongState(format!(
                "Cannot go from {} to {}",
                self, to
            )));
        }
        *self = to;
        Ok(())
    }

    pub fn is_logged_in(self) -> bool {
        matches!(self, ConnectionState::LoggedIn | ConnectionState::InGame)
    }

    /// Fail with a state error unless logged in
    pub fn require_logged_in(self) -> Result<()> {
        match self {
            ConnectionState::Connecting => {
                Err(Error::WrongState("Client is not initialized".into()))
            }
            ConnectionState::NotLoggedIn => {
                Err(Error::WrongState("Client is not logged in".into()))
            }
            ConnectionState::LoggedIn | ConnectionState::InGame => Ok(()),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::NotLoggedIn => "not logged in",
            ConnectionState::LoggedIn => "logged in",
            ConnectionState::InGame => "in game",
        };
        f.write_str(name)
    }
}
