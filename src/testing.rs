//! In-memory collaborators shared by the unit tests.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::engine::{AnalysisEngine, EngineError, Score};
use crate::models::events::{ChallengeTarget, GameEvent, IncomingEvent, OngoingGame, OnlineUser};
use crate::notify::Notifier;
use crate::platform::{EventStream, MoveOutcome, Platform, PlatformError};

fn refused() -> PlatformError {
    PlatformError::Status {
        status: 400,
        body: "refused".to_string(),
    }
}

fn unavailable(reason: &str) -> PlatformError {
    PlatformError::Status {
        status: 503,
        body: reason.to_string(),
    }
}

/// Platform that records every command and answers from canned data
#[derive(Default)]
pub struct FakePlatform {
    pub account: String,
    pub online: Mutex<Vec<String>>,
    pub ongoing: Mutex<usize>,
    pub fail_online: Mutex<bool>,
    pub fail_challenge: Mutex<bool>,
    pub fail_accept_challenge: Mutex<bool>,
    pub fail_draw: Mutex<bool>,
    pub fail_game_stream: Mutex<bool>,
    pub move_outcome: Mutex<Option<MoveOutcome>>,
    pub game_events: Mutex<Vec<GameEvent>>,
    pub incoming: Mutex<VecDeque<Result<Vec<IncomingEvent>, String>>>,

    pub accepted_challenges: Mutex<Vec<String>>,
    pub challenges: Mutex<Vec<ChallengeTarget>>,
    pub moves: Mutex<Vec<(String, String)>>,
    pub draws_accepted: Mutex<Vec<String>>,
}

impl FakePlatform {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            ..Self::default()
        }
    }

    pub fn with_online(self, names: &[&str]) -> Self {
        *self.online.lock().unwrap() = names.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn moves(&self) -> Vec<(String, String)> {
        self.moves.lock().unwrap().clone()
    }

    pub fn challenges(&self) -> Vec<ChallengeTarget> {
        self.challenges.lock().unwrap().clone()
    }

    pub fn draws_accepted(&self) -> Vec<String> {
        self.draws_accepted.lock().unwrap().clone()
    }

    pub fn accepted_challenges(&self) -> Vec<String> {
        self.accepted_challenges.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn stream_incoming_events(&self) -> Result<EventStream<IncomingEvent>, PlatformError> {
        match self.incoming.lock().unwrap().pop_front() {
            Some(Ok(events)) => Ok(stream::iter(events.into_iter().map(Ok)).boxed()),
            Some(Err(reason)) => Err(unavailable(&reason)),
            None => Err(unavailable("no more connections")),
        }
    }

    async fn stream_game_state(&self, _game_id: &str) -> Result<EventStream<GameEvent>, PlatformError> {
        if *self.fail_game_stream.lock().unwrap() {
            return Err(unavailable("game stream unavailable"));
        }
        let events = self.game_events.lock().unwrap().clone();
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }

    async fn accept_challenge(&self, challenge_id: &str) -> Result<(), PlatformError> {
        self.accepted_challenges.lock().unwrap().push(challenge_id.to_string());
        if *self.fail_accept_challenge.lock().unwrap() {
            return Err(refused());
        }
        Ok(())
    }

    async fn create_challenge(&self, target: &ChallengeTarget) -> Result<(), PlatformError> {
        self.challenges.lock().unwrap().push(target.clone());
        if *self.fail_challenge.lock().unwrap() {
            return Err(refused());
        }
        Ok(())
    }

    async fn ongoing_games(&self) -> Result<Vec<OngoingGame>, PlatformError> {
        let count = *self.ongoing.lock().unwrap();
        Ok((0..count)
            .map(|n| OngoingGame {
                game_id: format!("ongoing{}", n),
            })
            .collect())
    }

    async fn online_opponents(&self, limit: usize) -> Result<Vec<OnlineUser>, PlatformError> {
        if *self.fail_online.lock().unwrap() {
            return Err(unavailable("listing unavailable"));
        }
        Ok(self
            .online
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .map(|name| OnlineUser {
                username: name.clone(),
            })
            .collect())
    }

    async fn make_move(&self, game_id: &str, uci: &str) -> Result<MoveOutcome, PlatformError> {
        self.moves
            .lock()
            .unwrap()
            .push((game_id.to_string(), uci.to_string()));
        match *self.move_outcome.lock().unwrap() {
            Some(outcome) => Ok(outcome),
            None => Ok(MoveOutcome::Accepted),
        }
    }

    async fn accept_draw(&self, game_id: &str) -> Result<(), PlatformError> {
        if *self.fail_draw.lock().unwrap() {
            return Err(refused());
        }
        self.draws_accepted.lock().unwrap().push(game_id.to_string());
        Ok(())
    }

    async fn own_identity(&self) -> Result<String, PlatformError> {
        Ok(self.account.clone())
    }
}

/// Engine answering every request the same way
pub struct ScriptedEngine {
    best_move: Result<Option<String>, ()>,
    score: Result<Score, ()>,
    fens: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEngine {
    pub fn playing(best_move: Option<&str>) -> Self {
        Self {
            best_move: Ok(best_move.map(str::to_string)),
            score: Ok(Score::Centipawns(0)),
            fens: Arc::default(),
        }
    }

    pub fn scoring(score: Score) -> Self {
        Self {
            best_move: Ok(None),
            score: Ok(score),
            fens: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            best_move: Err(()),
            score: Err(()),
            fens: Arc::default(),
        }
    }

    pub fn with_score(mut self, score: Score) -> Self {
        self.score = Ok(score);
        self
    }

    /// Positions the engine was given, in order
    pub fn fens(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.fens)
    }
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        self.fens.lock().unwrap().push(fen.to_string());
        Ok(())
    }

    async fn best_move_within(&mut self, _millis: u64) -> Result<Option<String>, EngineError> {
        self.best_move.clone().map_err(|_| EngineError::Closed)
    }

    async fn evaluate(&mut self) -> Result<Score, EngineError> {
        self.score.map_err(|_| EngineError::Closed)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) {
        self.sent.lock().unwrap().push(text.to_string());
    }
}
