use actix::prelude::*;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::config::{EngineSettings, SessionSettings};
use crate::engine::MoveOracle;
use crate::models::events::GameEvent;
use crate::models::memory::OpponentMemory;
use crate::notify::{spawn_notify, Notifier};
use crate::platform::{EventStream, Platform, PlatformError};
use crate::session::game_handlers::{play_turn, SessionState, TurnPlan};

/// Ids of the games that currently have a session.
///
/// The event stream repeats `gameStart` for running games on every
/// reconnect; a claimed id is not launched again until its session stops.
#[derive(Debug, Clone, Default)]
pub struct ActiveGames {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl ActiveGames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a game as played. `false` when a session already owns it.
    pub fn claim(&self, game_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(game_id.to_string())
    }

    pub fn release(&self, game_id: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(game_id);
    }

    #[cfg(test)]
    pub fn contains(&self, game_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(game_id)
    }
}

/// Everything a game session needs from the rest of the bot
#[derive(Clone)]
pub struct SessionContext {
    pub game_id: String,
    pub account: String,
    pub base_url: String,
    pub platform: Arc<dyn Platform>,
    pub notifier: Arc<dyn Notifier>,
    pub memory: OpponentMemory,
    pub engine: EngineSettings,
    pub settings: SessionSettings,
    pub active: ActiveGames,
}

/// Actor playing one game from its state stream
pub struct GameSession {
    id: String,
    game_id: String,
    state: SessionState,
    /// Taken while a turn is being played
    oracle: Option<MoveOracle>,
    platform: Arc<dyn Platform>,
    notifier: Arc<dyn Notifier>,
    settings: SessionSettings,
    active: ActiveGames,
}

impl Actor for GameSession {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Session {} started for game {}", self.id, self.game_id);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.active.release(&self.game_id);
        info!("Session {} for game {} closed", self.id, self.game_id);
    }
}

impl StreamHandler<Result<GameEvent, PlatformError>> for GameSession {
    fn handle(&mut self, item: Result<GameEvent, PlatformError>, ctx: &mut Self::Context) {
        match item {
            Ok(event) => self.handle_event(event, ctx),
            Err(e) => warn!("Game {} stream error: {}", self.game_id, e),
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        info!("Game {} stream ended", self.game_id);
        ctx.stop();
    }
}

impl GameSession {
    fn new(context: SessionContext, oracle: MoveOracle) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: SessionState::new(&context.game_id, &context.account, context.memory),
            game_id: context.game_id,
            oracle: Some(oracle),
            platform: context.platform,
            notifier: context.notifier,
            settings: context.settings,
            active: context.active,
        }
    }

    fn handle_event(&mut self, event: GameEvent, ctx: &mut Context<Self>) {
        let step = self.state.handle_event(event);
        for notice in step.notices {
            spawn_notify(&self.notifier, notice);
        }
        if let Some(plan) = step.turn {
            self.play(plan, ctx);
        }
        if self.state.is_terminal() {
            ctx.stop();
        }
    }

    /// Play one turn. `ctx.wait` holds back further stream items until the
    /// turn is done, so updates are handled strictly in order.
    fn play(&mut self, plan: TurnPlan, ctx: &mut Context<Self>) {
        let Some(mut oracle) = self.oracle.take() else {
            warn!("Game {}: oracle busy, update dropped", self.game_id);
            return;
        };
        let platform = Arc::clone(&self.platform);
        let game_id = self.game_id.clone();
        let settings = self.settings.clone();

        let turn = async move {
            let outcome = play_turn(&mut oracle, platform.as_ref(), &game_id, &plan, &settings).await;
            (oracle, outcome)
        };
        ctx.wait(turn.into_actor(self).map(|(oracle, outcome), act, _ctx| {
            debug!("Game {}: turn finished with {:?}", act.game_id, outcome);
            act.oracle = Some(oracle);
        }));
    }
}

/// Start a session actor over an already opened game stream.
pub fn start_session(
    context: SessionContext,
    oracle: MoveOracle,
    stream: EventStream<GameEvent>,
) -> Addr<GameSession> {
    GameSession::create(move |ctx| {
        ctx.add_stream(stream);
        GameSession::new(context, oracle)
    })
}

/// Open the game stream, launch an engine and start the session.
pub async fn spawn_session(context: SessionContext) -> Option<Addr<GameSession>> {
    let stream = match context.platform.stream_game_state(&context.game_id).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Could not open game {}: {}", context.game_id, e);
            context.active.release(&context.game_id);
            return None;
        }
    };
    let oracle = MoveOracle::launch(&context.engine).await;
    if !oracle.has_engine() {
        warn!("Game {} will be played with random moves", context.game_id);
    }
    spawn_notify(
        &context.notifier,
        format!(
            "Game started\nWatch live: {}/{}",
            context.base_url.trim_end_matches('/'),
            context.game_id
        ),
    );
    Some(start_session(context, oracle, stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::{GameFull, GameStateUpdate, PlayerInfo};
    use crate::models::memory::GameResult;
    use crate::testing::{FakePlatform, RecordingNotifier, ScriptedEngine};
    use std::time::Duration;

    fn player(name: &str) -> PlayerInfo {
        PlayerInfo {
            id: Some(name.to_lowercase()),
            name: Some(name.to_string()),
            ai_level: None,
        }
    }

    fn game_full(white: &str, black: &str) -> GameEvent {
        GameEvent::GameFull(GameFull {
            id: "g1".to_string(),
            white: player(white),
            black: player(black),
            state: GameStateUpdate {
                status: Some("started".to_string()),
                ..GameStateUpdate::default()
            },
        })
    }

    fn moves(list: &str) -> GameEvent {
        GameEvent::GameState(GameStateUpdate {
            moves: list.to_string(),
            status: Some("started".to_string()),
            ..GameStateUpdate::default()
        })
    }

    fn context(
        platform: &Arc<FakePlatform>,
        notifier: &Arc<RecordingNotifier>,
        memory: &OpponentMemory,
    ) -> SessionContext {
        SessionContext {
            game_id: "g1".to_string(),
            account: "mybot".to_string(),
            base_url: "https://lichess.org".to_string(),
            platform: platform.clone(),
            notifier: notifier.clone(),
            memory: memory.clone(),
            engine: EngineSettings::with_path("stockfish"),
            settings: SessionSettings::default(),
            active: ActiveGames::new(),
        }
    }

    async fn settle<F: Fn() -> bool>(done: F) {
        for _ in 0..100 {
            if done() {
                return;
            }
            actix_rt::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[actix_rt::test]
    async fn session_moves_when_it_is_our_turn() {
        let platform = Arc::new(FakePlatform::new("mybot"));
        *platform.game_events.lock().unwrap() = vec![game_full("Rival", "MyBot"), moves("e2e4")];
        let notifier = Arc::new(RecordingNotifier::default());
        let memory = OpponentMemory::new();

        let stream = platform.stream_game_state("g1").await.unwrap();
        let oracle = MoveOracle::new(Box::new(ScriptedEngine::playing(Some("e7e5"))));
        start_session(context(&platform, &notifier, &memory), oracle, stream);

        settle(|| !platform.moves().is_empty()).await;
        assert_eq!(platform.moves(), vec![("g1".to_string(), "e7e5".to_string())]);
    }

    #[actix_rt::test]
    async fn session_records_the_result_and_notifies() {
        let platform = Arc::new(FakePlatform::new("mybot"));
        *platform.game_events.lock().unwrap() =
            vec![game_full("Rival", "MyBot"), moves("f2f3 e7e5 g2g4 d8h4")];
        let notifier = Arc::new(RecordingNotifier::default());
        let memory = OpponentMemory::new();

        let stream = platform.stream_game_state("g1").await.unwrap();
        start_session(context(&platform, &notifier, &memory), MoveOracle::unavailable(), stream);

        settle(|| notifier.sent.lock().unwrap().len() >= 2).await;
        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().any(|text| text.contains("Black vs Rival")));
        assert!(sent.iter().any(|text| text.contains("win vs Rival")));
        assert_eq!(memory.snapshot().last_result, Some(GameResult::Win));
        assert!(platform.moves().is_empty());
    }

    #[actix_rt::test]
    async fn stopped_session_frees_its_game() {
        let platform = Arc::new(FakePlatform::new("mybot"));
        *platform.game_events.lock().unwrap() = vec![game_full("MyBot", "Rival")];
        let notifier = Arc::new(RecordingNotifier::default());
        let context = context(&platform, &notifier, &OpponentMemory::new());
        let active = context.active.clone();
        assert!(active.claim("g1"));
        assert!(!active.claim("g1"));

        let stream = platform.stream_game_state("g1").await.unwrap();
        let oracle = MoveOracle::new(Box::new(ScriptedEngine::playing(Some("e2e4"))));
        start_session(context, oracle, stream);

        settle(|| !active.contains("g1")).await;
        assert!(!active.contains("g1"));
        assert!(active.claim("g1"));
    }

    #[actix_rt::test]
    async fn unopenable_game_frees_its_claim() {
        let platform = Arc::new(FakePlatform::new("mybot"));
        *platform.fail_game_stream.lock().unwrap() = true;
        let notifier = Arc::new(RecordingNotifier::default());
        let context = context(&platform, &notifier, &OpponentMemory::new());
        let active = context.active.clone();
        active.claim("g1");

        assert!(spawn_session(context).await.is_none());
        assert!(!active.contains("g1"));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
