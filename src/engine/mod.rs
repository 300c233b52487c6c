//! Move oracle backed by an external analysis engine.
//!
//! Engine trouble never escapes this module: moves fall back to a random
//! legal move and evaluations to a neutral score.

pub mod uci;

use async_trait::async_trait;
use chess::ChessMove;
use log::{error, info, warn};
use rand::seq::SliceRandom;
use std::io;
use thiserror::Error;

use crate::config::EngineSettings;
use crate::game::position::{parse_uci, Position};

/// Magnitude reported for any forced mate
pub const MATE_SCORE: i32 = 10_000;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine io: {0}")]
    Io(#[from] io::Error),
    #[error("engine did not answer within {0} ms")]
    Timeout(u64),
    #[error("engine closed its output")]
    Closed,
    #[error("engine protocol: {0}")]
    Protocol(String),
}

/// Engine score from the side to move's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32),
}

impl Score {
    pub fn centipawns(&self) -> i32 {
        match *self {
            Score::Centipawns(cp) => cp,
            Score::Mate(moves) if moves > 0 => MATE_SCORE,
            Score::Mate(_) => -MATE_SCORE,
        }
    }
}

/// Stateful engine process the oracle owns exclusively
#[async_trait]
pub trait AnalysisEngine: Send {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError>;

    /// Best move in long algebraic notation, `None` when the engine has none.
    async fn best_move_within(&mut self, millis: u64) -> Result<Option<String>, EngineError>;

    async fn evaluate(&mut self) -> Result<Score, EngineError>;
}

pub struct MoveOracle {
    engine: Option<Box<dyn AnalysisEngine>>,
}

impl MoveOracle {
    pub fn new(engine: Box<dyn AnalysisEngine>) -> Self {
        Self { engine: Some(engine) }
    }

    /// Oracle that only ever plays random legal moves.
    pub fn unavailable() -> Self {
        Self { engine: None }
    }

    /// Start the engine process. A failed start is logged and leaves the
    /// oracle in random-move mode.
    pub async fn launch(settings: &EngineSettings) -> Self {
        match uci::UciEngine::spawn(settings).await {
            Ok(engine) => {
                info!("Engine loaded from {}", settings.path);
                Self::new(Box::new(engine))
            }
            Err(e) => {
                error!("Failed to load engine from {}: {}", settings.path, e);
                Self::unavailable()
            }
        }
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// A legal move for `position`. `None` only when there is no legal move.
    pub async fn best_move(&mut self, position: &Position, budget_ms: u64) -> Option<ChessMove> {
        if let Some(engine) = self.engine.as_mut() {
            match Self::ask_engine(&mut **engine, position, budget_ms).await {
                Ok(Some(uci)) => match parse_uci(&uci).filter(|mv| position.is_legal(*mv)) {
                    Some(mv) => return Some(mv),
                    None => warn!("Engine proposed unusable move `{}`, playing random", uci),
                },
                Ok(None) => warn!("Engine returned no move, playing random"),
                Err(e) => warn!("Engine error, playing random: {}", e),
            }
        }
        random_move(position)
    }

    /// Centipawns for the side to move; `0` when the engine cannot tell.
    pub async fn evaluate(&mut self, position: &Position) -> i32 {
        let Some(engine) = self.engine.as_mut() else {
            return 0;
        };
        match Self::score_with(&mut **engine, position).await {
            Ok(score) => score.centipawns(),
            Err(e) => {
                warn!("Engine evaluation failed: {}", e);
                0
            }
        }
    }

    async fn ask_engine(
        engine: &mut dyn AnalysisEngine,
        position: &Position,
        budget_ms: u64,
    ) -> Result<Option<String>, EngineError> {
        engine.set_position(&position.fen()).await?;
        engine.best_move_within(budget_ms).await
    }

    async fn score_with(engine: &mut dyn AnalysisEngine, position: &Position) -> Result<Score, EngineError> {
        engine.set_position(&position.fen()).await?;
        engine.evaluate().await
    }
}

fn random_move(position: &Position) -> Option<ChessMove> {
    position.legal_moves().choose(&mut rand::thread_rng()).copied()
}
