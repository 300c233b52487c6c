use futures::StreamExt;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EngineSettings, SessionSettings};
use crate::models::events::{ChallengeInfo, IncomingEvent};
use crate::models::memory::OpponentMemory;
use crate::notify::Notifier;
use crate::platform::{Platform, PlatformError};
use crate::session::handler::{spawn_session, ActiveGames, SessionContext};

/// Starts whatever plays a newly started game
pub trait SessionLauncher {
    fn launch(&self, game_id: &str);
}

/// Launches a `GameSession` actor per game
pub struct ActorLauncher {
    pub account: String,
    pub base_url: String,
    pub platform: Arc<dyn Platform>,
    pub notifier: Arc<dyn Notifier>,
    pub memory: OpponentMemory,
    pub engine: EngineSettings,
    pub settings: SessionSettings,
    pub active: ActiveGames,
}

impl SessionLauncher for ActorLauncher {
    fn launch(&self, game_id: &str) {
        let context = SessionContext {
            game_id: game_id.to_string(),
            account: self.account.clone(),
            base_url: self.base_url.clone(),
            platform: Arc::clone(&self.platform),
            notifier: Arc::clone(&self.notifier),
            memory: self.memory.clone(),
            engine: self.engine.clone(),
            settings: self.settings.clone(),
            active: self.active.clone(),
        };
        actix_rt::spawn(async move {
            spawn_session(context).await;
        });
    }
}

/// Dispatches the account event stream: accepts challenges, starts games
pub struct EventRouter {
    account: String,
    platform: Arc<dyn Platform>,
    launcher: Arc<dyn SessionLauncher>,
    active: ActiveGames,
    reconnect_delay: Duration,
}

impl EventRouter {
    pub fn new(
        account: &str,
        platform: Arc<dyn Platform>,
        launcher: Arc<dyn SessionLauncher>,
        active: ActiveGames,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            account: account.to_string(),
            platform,
            launcher,
            active,
            reconnect_delay,
        }
    }

    fn is_own_challenge(&self, challenge: &ChallengeInfo) -> bool {
        challenge.challenger.as_ref().is_some_and(|user| {
            user.name.eq_ignore_ascii_case(&self.account)
                || user
                    .id
                    .as_deref()
                    .is_some_and(|id| id.eq_ignore_ascii_case(&self.account))
        })
    }

    pub async fn handle(&self, event: IncomingEvent) {
        match event {
            IncomingEvent::Challenge { challenge } => {
                if self.is_own_challenge(&challenge) {
                    info!("Skipping own challenge {}", challenge.id);
                    return;
                }
                let from = challenge
                    .challenger
                    .as_ref()
                    .map(|user| user.name.as_str())
                    .unwrap_or("unknown");
                info!("Challenge {} from {}, accepting", challenge.id, from);
                if let Err(e) = self.platform.accept_challenge(&challenge.id).await {
                    warn!("Could not accept challenge {}: {}", challenge.id, e);
                }
            }
            IncomingEvent::GameStart { game } => {
                if !self.active.claim(&game.id) {
                    info!("Game {} already has a session", game.id);
                    return;
                }
                info!("Game {} started", game.id);
                self.launcher.launch(&game.id);
            }
            IncomingEvent::Other => {}
        }
    }

    /// Follow one connection of the event stream until it ends.
    async fn drain(&self) -> Result<(), PlatformError> {
        let mut events = self.platform.stream_incoming_events().await?;
        info!("Listening for challenges and games");
        while let Some(event) = events.next().await {
            self.handle(event?).await;
        }
        Ok(())
    }

    /// Reconnects forever; the event stream is the only source of new games.
    pub async fn run(self) {
        loop {
            match self.drain().await {
                Ok(()) => warn!("Event stream closed"),
                Err(e) => warn!("Event stream lost: {}", e),
            }
            info!("Reconnecting in {:?}", self.reconnect_delay);
            actix_rt::time::sleep(self.reconnect_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::{GameStartInfo, UserRef};
    use crate::testing::FakePlatform;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        launched: Mutex<Vec<String>>,
    }

    impl SessionLauncher for RecordingLauncher {
        fn launch(&self, game_id: &str) {
            self.launched.lock().unwrap().push(game_id.to_string());
        }
    }

    fn challenge(id: &str, user_id: Option<&str>, name: &str) -> IncomingEvent {
        IncomingEvent::Challenge {
            challenge: ChallengeInfo {
                id: id.to_string(),
                challenger: Some(UserRef {
                    id: user_id.map(str::to_string),
                    name: name.to_string(),
                }),
            },
        }
    }

    fn game_start(id: &str) -> IncomingEvent {
        IncomingEvent::GameStart {
            game: GameStartInfo { id: id.to_string() },
        }
    }

    fn router(platform: &Arc<FakePlatform>, launcher: &Arc<RecordingLauncher>) -> EventRouter {
        EventRouter::new(
            "MyBot",
            platform.clone(),
            launcher.clone(),
            ActiveGames::new(),
            Duration::from_millis(10),
        )
    }

    #[actix_rt::test]
    async fn accepts_others_and_skips_own_challenges() {
        let platform = Arc::new(FakePlatform::new("MyBot"));
        let launcher = Arc::new(RecordingLauncher::default());
        let router = router(&platform, &launcher);

        router.handle(challenge("c1", Some("rival"), "Rival")).await;
        router.handle(challenge("c2", Some("mybot"), "MYBOT")).await;
        router.handle(challenge("c3", Some("mybot"), "Renamed")).await;
        router.handle(IncomingEvent::Other).await;

        assert_eq!(platform.accepted_challenges(), vec!["c1".to_string()]);
        assert!(launcher.launched.lock().unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn failed_accept_is_not_fatal() {
        let platform = Arc::new(FakePlatform::new("MyBot"));
        *platform.fail_accept_challenge.lock().unwrap() = true;
        let launcher = Arc::new(RecordingLauncher::default());
        let router = router(&platform, &launcher);

        router.handle(challenge("c1", None, "Rival")).await;
        router.handle(game_start("g1")).await;

        assert_eq!(platform.accepted_challenges(), vec!["c1".to_string()]);
        assert_eq!(*launcher.launched.lock().unwrap(), vec!["g1".to_string()]);
    }

    #[actix_rt::test]
    async fn reconnects_after_errors_and_launches_every_game() {
        let platform = Arc::new(FakePlatform::new("MyBot"));
        {
            let mut incoming = platform.incoming.lock().unwrap();
            incoming.push_back(Err("connection reset".to_string()));
            incoming.push_back(Ok(vec![game_start("g1"), challenge("c1", None, "Rival")]));
            incoming.push_back(Ok(vec![game_start("g2")]));
        }
        let launcher = Arc::new(RecordingLauncher::default());

        let running = tokio::time::timeout(Duration::from_millis(300), router(&platform, &launcher).run()).await;
        assert!(running.is_err(), "the router never returns");

        assert_eq!(
            *launcher.launched.lock().unwrap(),
            vec!["g1".to_string(), "g2".to_string()]
        );
        assert_eq!(platform.accepted_challenges(), vec!["c1".to_string()]);
    }

    #[actix_rt::test]
    async fn restarted_game_is_not_launched_twice() {
        let platform = Arc::new(FakePlatform::new("MyBot"));
        {
            let mut incoming = platform.incoming.lock().unwrap();
            incoming.push_back(Ok(vec![game_start("g1")]));
            incoming.push_back(Ok(vec![game_start("g1"), game_start("g2")]));
        }
        let launcher = Arc::new(RecordingLauncher::default());
        let active = ActiveGames::new();
        let router = EventRouter::new(
            "MyBot",
            platform.clone(),
            launcher.clone(),
            active.clone(),
            Duration::from_millis(10),
        );

        let running = tokio::time::timeout(Duration::from_millis(200), router.run()).await;
        assert!(running.is_err());
        assert_eq!(
            *launcher.launched.lock().unwrap(),
            vec!["g1".to_string(), "g2".to_string()]
        );

        active.release("g1");
        let router = EventRouter::new(
            "MyBot",
            platform.clone(),
            launcher.clone(),
            active.clone(),
            Duration::from_millis(10),
        );
        router.handle(game_start("g1")).await;
        router.handle(game_start("g2")).await;
        assert_eq!(
            *launcher.launched.lock().unwrap(),
            vec!["g1".to_string(), "g2".to_string(), "g1".to_string()]
        );
    }
}
