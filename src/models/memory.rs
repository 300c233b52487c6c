use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Result of a finished game from the bot's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

impl GameResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameResult::Win => "win",
            GameResult::Loss => "loss",
            GameResult::Draw => "draw",
        }
    }
}

/// Plain snapshot of what the bot remembers about its opponents
#[derive(Debug, Clone, Default)]
pub struct MemoryRecord {
    pub last_opponent: Option<String>,
    pub last_result: Option<GameResult>,
    pub conquered: HashSet<String>,
}

impl MemoryRecord {
    pub fn is_conquered(&self, name: &str) -> bool {
        self.conquered
            .iter()
            .any(|beaten| beaten.eq_ignore_ascii_case(name))
    }

    pub fn is_last_opponent(&self, name: &str) -> bool {
        self.last_opponent
            .as_deref()
            .is_some_and(|last| last.eq_ignore_ascii_case(name))
    }
}

/// Opponent memory shared between every game session and the matchmaker.
///
/// Cloning hands out another handle to the same record. Each access takes the
/// lock once; readers may observe a slightly stale record.
#[derive(Debug, Clone, Default)]
pub struct OpponentMemory {
    inner: Arc<Mutex<MemoryRecord>>,
}

impl OpponentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the outcome of one finished game.
    pub fn record(&self, opponent: &str, result: GameResult) {
        let mut record = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        record.last_opponent = Some(opponent.to_string());
        record.last_result = Some(result);
        if result == GameResult::Win && !record.is_conquered(opponent) {
            record.conquered.insert(opponent.to_string());
        }
    }

    pub fn snapshot(&self) -> MemoryRecord {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
