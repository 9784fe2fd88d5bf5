//! Pentago Core Library
//!
//! Board engine, move strategies, players, and the threaded game session.

pub mod board;
pub mod error;
pub mod invariants;
pub mod marble;
pub mod observer;
pub mod player;
pub mod result;
pub mod session;
pub mod strategy;

pub use board::{Board, Move, Rotation, CELLS, DIM, ROTATIONS, SUB_DIM, WINNING_STREAK};
pub use error::{Error, Result};
pub use marble::Marble;
pub use observer::{BoardObserver, LoggingObserver};
pub use player::{AiPlayer, BufferedPlayer, Decision, Player};
pub use result::GameResult;
pub use session::GameSession;
pub use strategy::{ExpertStrategy, NaiveStrategy, Strategy};
