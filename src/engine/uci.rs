use async_trait::async_trait;
use log::debug;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;

use crate::config::EngineSettings;
use crate::engine::{AnalysisEngine, EngineError, Score};

const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
/// Slack on top of the search budget before the engine counts as hung
const GRACE_MS: u64 = 5_000;

/// Engine speaking UCI over the stdin/stdout of a child process
pub struct UciEngine {
    // Held so the process lives exactly as long as the engine.
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    eval_time_ms: u64,
    grace_ms: u64,
    /// Set while a `go` has not been answered by `bestmove`
    in_search: bool,
}

impl UciEngine {
    pub async fn spawn(settings: &EngineSettings) -> Result<Self, EngineError> {
        Self::start(Command::new(&settings.path), settings).await
    }

    async fn start(mut command: Command, settings: &EngineSettings) -> Result<Self, EngineError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Protocol("no stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Protocol("no stdout handle".to_string()))?;

        let mut engine = Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            eval_time_ms: settings.eval_time_ms,
            grace_ms: GRACE_MS,
            in_search: false,
        };

        engine.send("uci").await?;
        engine.wait_for("uciok", HANDSHAKE_TIMEOUT_MS).await?;
        for (name, value) in settings.uci_options() {
            engine.send(&format!("setoption name {} value {}", name, value)).await?;
        }
        engine.send("isready").await?;
        engine.wait_for("readyok", HANDSHAKE_TIMEOUT_MS).await?;
        Ok(engine)
    }

    async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        debug!("engine <- {}", command);
        self.stdin.write_all(command.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, EngineError> {
        match self.stdout.next_line().await? {
            Some(line) => Ok(line),
            None => Err(EngineError::Closed),
        }
    }

    async fn read_until(&mut self, token: &str) -> Result<(), EngineError> {
        loop {
            if self.read_line().await?.trim() == token {
                return Ok(());
            }
        }
    }

    async fn wait_for(&mut self, token: &str, limit_ms: u64) -> Result<(), EngineError> {
        timeout(Duration::from_millis(limit_ms), self.read_until(token))
            .await
            .map_err(|_| EngineError::Timeout(limit_ms))?
    }

    /// Stop an abandoned search and consume its `bestmove` together with
    /// the `readyok`, in whichever order the engine prints them.
    async fn resync(&mut self) -> Result<(), EngineError> {
        self.send("stop").await?;
        self.send("isready").await?;
        timeout(Duration::from_millis(HANDSHAKE_TIMEOUT_MS), self.drain_stopped_search())
            .await
            .map_err(|_| EngineError::Timeout(HANDSHAKE_TIMEOUT_MS))??;
        self.in_search = false;
        Ok(())
    }

    async fn drain_stopped_search(&mut self) -> Result<(), EngineError> {
        let mut stopped = false;
        let mut ready = false;
        while !(stopped && ready) {
            let line = self.read_line().await?;
            if parse_bestmove(&line).is_some() {
                stopped = true;
            } else if line.trim() == "readyok" {
                ready = true;
            }
        }
        Ok(())
    }

    async fn read_search(&mut self) -> Result<SearchResult, EngineError> {
        let mut score = None;
        loop {
            let line = self.read_line().await?;
            if let Some(best_move) = parse_bestmove(&line) {
                return Ok(SearchResult { best_move, score });
            }
            if let Some(latest) = parse_score(&line) {
                score = Some(latest);
            }
        }
    }

    /// Run `go movetime` and collect the last score and the best move.
    async fn search(&mut self, millis: u64) -> Result<SearchResult, EngineError> {
        if self.in_search {
            self.resync().await?;
        }
        self.send(&format!("go movetime {}", millis)).await?;
        self.in_search = true;
        let limit_ms = millis + self.grace_ms;
        let result = timeout(Duration::from_millis(limit_ms), self.read_search())
            .await
            .map_err(|_| EngineError::Timeout(limit_ms))??;
        self.in_search = false;
        Ok(result)
    }
}

struct SearchResult {
    best_move: Option<String>,
    score: Option<Score>,
}

#[async_trait]
impl AnalysisEngine for UciEngine {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        self.send(&format!("position fen {}", fen)).await
    }

    async fn best_move_within(&mut self, millis: u64) -> Result<Option<String>, EngineError> {
        Ok(self.search(millis).await?.best_move)
    }

    async fn evaluate(&mut self) -> Result<Score, EngineError> {
        let eval_time_ms = self.eval_time_ms;
        self.search(eval_time_ms)
            .await?
            .score
            .ok_or_else(|| EngineError::Protocol("search finished without a score".to_string()))
    }
}

/// `bestmove e2e4 ponder e7e5` -> `Some(Some("e2e4"))`, `bestmove (none)` -> `Some(None)`
fn parse_bestmove(line: &str) -> Option<Option<String>> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "bestmove" {
        return None;
    }
    match tokens.next() {
        Some("(none)") | Some("0000") | None => Some(None),
        Some(mv) => Some(Some(mv.to_string())),
    }
}

/// Score from an `info` line, e.g. `info depth 20 score cp -31 nodes ...`
fn parse_score(line: &str) -> Option<Score> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&"info") {
        return None;
    }
    let at = tokens.iter().position(|token| *token == "score")?;
    let value: i32 = tokens.get(at + 2)?.parse().ok()?;
    match *tokens.get(at + 1)? {
        "cp" => Some(Score::Centipawns(value)),
        "mate" => Some(Score::Mate(value)),
        _ => None,
    }
}
