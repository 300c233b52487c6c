//! Background loop that keeps the bot busy by challenging online bots.

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

use crate::config::MatchmakingSettings;
use crate::models::events::ChallengeTarget;
use crate::models::memory::{GameResult, MemoryRecord, OpponentMemory};
use crate::notify::{spawn_notify, Notifier};
use crate::platform::{Platform, PlatformError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A game is in progress, so nobody was challenged.
    Busy,
    NoOpponents,
    Challenged(String),
    ChallengeFailed(String),
}

/// Pick the next opponent from the online bots (self already removed).
///
/// Revenge on the last opponent after a loss comes first. Otherwise an
/// unbeaten bot is picked, preferring one we did not just play; failing
/// that, anyone online.
pub fn select_target<R: Rng + ?Sized>(valid: &[String], record: &MemoryRecord, rng: &mut R) -> Option<String> {
    if record.last_result == Some(GameResult::Loss) {
        let nemesis = valid.iter().find(|name| record.is_last_opponent(name));
        if let Some(name) = nemesis {
            info!("Revenge: challenging {} again", name);
            return Some(name.clone());
        }
    }

    let fresh: Vec<&String> = valid.iter().filter(|name| !record.is_conquered(name)).collect();
    let preferred: Vec<&String> = fresh
        .iter()
        .copied()
        .filter(|name| !record.is_last_opponent(name))
        .collect();

    let pool = if !preferred.is_empty() {
        preferred
    } else if !fresh.is_empty() {
        fresh
    } else {
        info!("No unbeaten opponents online, picking an old rival");
        valid.iter().collect()
    };
    pool.choose(rng).map(|name| name.to_string())
}

pub struct Matchmaker {
    account: String,
    platform: Arc<dyn Platform>,
    notifier: Arc<dyn Notifier>,
    memory: OpponentMemory,
    settings: MatchmakingSettings,
    rng: StdRng,
}

impl Matchmaker {
    pub fn new(
        account: &str,
        platform: Arc<dyn Platform>,
        notifier: Arc<dyn Notifier>,
        memory: OpponentMemory,
        settings: MatchmakingSettings,
    ) -> Self {
        Self {
            account: account.to_string(),
            platform,
            notifier,
            memory,
            settings,
            rng: StdRng::from_entropy(),
        }
    }

    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// One iteration of the matchmaking policy.
    pub async fn tick(&mut self) -> Result<TickOutcome, PlatformError> {
        let ongoing = self.platform.ongoing_games().await?;
        if !ongoing.is_empty() {
            let ids: Vec<&str> = ongoing.iter().map(|game| game.game_id.as_str()).collect();
            info!("Playing {}, not seeking", ids.join(", "));
            return Ok(TickOutcome::Busy);
        }

        let valid: Vec<String> = self
            .platform
            .online_opponents(self.settings.online_limit)
            .await?
            .into_iter()
            .map(|user| user.username)
            .filter(|name| !name.eq_ignore_ascii_case(&self.account))
            .collect();

        let record = self.memory.snapshot();
        let Some(opponent) = select_target(&valid, &record, &mut self.rng) else {
            info!("No bots online");
            return Ok(TickOutcome::NoOpponents);
        };

        let target = self.challenge_for(&opponent);
        match self.platform.create_challenge(&target).await {
            Ok(()) => {
                info!("Challenged {}", opponent);
                spawn_notify(&self.notifier, format!("Challenged {}", opponent));
                Ok(TickOutcome::Challenged(opponent))
            }
            Err(e) => {
                warn!("Challenge to {} failed: {}", opponent, e);
                Ok(TickOutcome::ChallengeFailed(opponent))
            }
        }
    }

    fn challenge_for(&self, opponent: &str) -> ChallengeTarget {
        ChallengeTarget {
            opponent: opponent.to_string(),
            rated: self.settings.rated,
            clock_limit_secs: self.settings.clock_limit_secs,
            clock_increment_secs: self.settings.clock_increment_secs,
            color: self.settings.color,
        }
    }

    /// How long to wait before the next iteration.
    fn pause_after(&self, result: &Result<TickOutcome, PlatformError>) -> Duration {
        match result {
            Ok(TickOutcome::Challenged(_)) | Ok(TickOutcome::ChallengeFailed(_)) => self.settings.poll_interval,
            Ok(TickOutcome::Busy) | Ok(TickOutcome::NoOpponents) => self.settings.busy_interval,
            Err(_) => self.settings.busy_interval,
        }
    }

    /// Runs until the process exits.
    pub async fn run(mut self) {
        info!("Matchmaking started for {}", self.account);
        loop {
            let result = self.tick().await;
            if let Err(e) = &result {
                error!("Matchmaking iteration failed: {}", e);
            }
            let pause = self.pause_after(&result);
            actix_rt::time::sleep(pause).await;
        }
    }
}
