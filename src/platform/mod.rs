//! Abstract command/query interface to the game platform.
//!
//! Every call may fail with a transient [`PlatformError`]. Callers log and
//! carry on; nothing here is fatal.

pub mod lichess;
pub mod ndjson;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::models::events::{ChallengeTarget, GameEvent, IncomingEvent, OngoingGame, OnlineUser};

pub type EventStream<T> = BoxStream<'static, Result<T, PlatformError>>;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("platform answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("undecodable payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What happened to a move we sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted,
    /// The platform saw the opponent's move before ours. The next state
    /// update drives the session again.
    RejectedNotMyTurn,
}

#[async_trait]
pub trait Platform: Send + Sync {
    async fn stream_incoming_events(&self) -> Result<EventStream<IncomingEvent>, PlatformError>;

    async fn stream_game_state(&self, game_id: &str) -> Result<EventStream<GameEvent>, PlatformError>;

    async fn accept_challenge(&self, challenge_id: &str) -> Result<(), PlatformError>;

    async fn create_challenge(&self, target: &ChallengeTarget) -> Result<(), PlatformError>;

    async fn ongoing_games(&self) -> Result<Vec<OngoingGame>, PlatformError>;

    async fn online_opponents(&self, limit: usize) -> Result<Vec<OnlineUser>, PlatformError>;

    async fn make_move(&self, game_id: &str, uci: &str) -> Result<MoveOutcome, PlatformError>;

    async fn accept_draw(&self, game_id: &str) -> Result<(), PlatformError>;

    async fn own_identity(&self) -> Result<String, PlatformError>;
}
