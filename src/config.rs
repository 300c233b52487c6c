use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::models::events::ColorPreference;

pub const DEFAULT_BASE_URL: &str = "https://lichess.org";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("platform token not found: set `lichess` (or LICHESS_TOKEN) in the environment or .env")]
    MissingToken,
    #[error("platform client could not be built: {0}")]
    Client(String),
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: String,
}

/// Analysis engine process settings
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub path: String,
    pub threads: u32,
    pub hash_mb: u32,
    pub skill_level: u32,
    pub contempt: i32,
    pub min_thinking_time_ms: u64,
    pub eval_time_ms: u64,
}

impl EngineSettings {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            threads: 2,
            hash_mb: 128,
            skill_level: 20,
            contempt: 25,
            min_thinking_time_ms: 1000,
            eval_time_ms: 1000,
        }
    }

    /// `setoption` pairs sent after the handshake
    pub fn uci_options(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Threads", self.threads.to_string()),
            ("Hash", self.hash_mb.to_string()),
            ("Contempt", self.contempt.to_string()),
            ("Minimum Thinking Time", self.min_thinking_time_ms.to_string()),
            ("Skill Level", self.skill_level.to_string()),
        ]
    }
}

/// Per-game decision constants
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub move_time_ms: u64,
    pub draw_threshold_cp: i32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            move_time_ms: 2500,
            draw_threshold_cp: 100,
        }
    }
}

/// Matchmaking cadence and the fixed challenge parameters
#[derive(Debug, Clone)]
pub struct MatchmakingSettings {
    pub poll_interval: Duration,
    pub busy_interval: Duration,
    pub online_limit: usize,
    pub rated: bool,
    pub clock_limit_secs: u32,
    pub clock_increment_secs: u32,
    pub color: ColorPreference,
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(45),
            busy_interval: Duration::from_secs(60),
            online_limit: 50,
            rated: true,
            clock_limit_secs: 180,
            clock_increment_secs: 0,
            color: ColorPreference::Random,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub base_url: String,
    pub telegram: Option<TelegramSettings>,
    pub engine: EngineSettings,
    pub session: SessionSettings,
    pub matchmaking: MatchmakingSettings,
    pub reconnect_delay: Duration,
}

impl BotConfig {
    /// Read the process environment. The engine binary is located once, here.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(|key| std::env::var(key).ok(), &base_dir, |path| path.exists())
    }

    pub fn from_lookup<L, E>(lookup: L, base_dir: &Path, exists: E) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
        E: Fn(&Path) -> bool,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let token = non_empty("lichess")
            .or_else(|| non_empty("LICHESS_TOKEN"))
            .ok_or(ConfigError::MissingToken)?;

        let telegram = match (non_empty("telegram_token"), non_empty("telegram_chat_id")) {
            (Some(token), Some(chat_id)) => Some(TelegramSettings { token, chat_id }),
            _ => None,
        };

        let engine_path = resolve_engine_path(non_empty("STOCKFISH_PATH"), &engine_candidates(base_dir), exists);

        Ok(Self {
            token,
            base_url: non_empty("LICHESS_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            telegram,
            engine: EngineSettings::with_path(engine_path),
            session: SessionSettings::default(),
            matchmaking: MatchmakingSettings::default(),
            reconnect_delay: Duration::from_secs(5),
        })
    }
}

/// Where the engine binary usually lives on this OS, in search order
pub fn engine_candidates(base_dir: &Path) -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![base_dir.join("stockfish").join("stockfish-windows-x86-64-avx2.exe")]
    } else {
        vec![base_dir.join("stockfish"), PathBuf::from("/usr/games/stockfish")]
    }
}

/// Pick the engine binary: explicit override, then the first existing
/// candidate, then the bare command name left to `PATH`.
pub fn resolve_engine_path<E>(explicit: Option<String>, candidates: &[PathBuf], exists: E) -> String
where
    E: Fn(&Path) -> bool,
{
    if let Some(path) = explicit {
        return path;
    }
    candidates
        .iter()
        .find(|candidate| exists(candidate))
        .map(|candidate| candidate.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stockfish".to_string())
}
