use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

mod config;
mod engine;
mod game;
mod matchmaking;
mod models;
mod notify;
mod platform;
mod router;
mod session;

#[cfg(test)]
mod testing;

use config::{BotConfig, ConfigError};
use matchmaking::Matchmaker;
use models::memory::OpponentMemory;
use platform::lichess::LichessClient;
use platform::Platform;
use router::{ActorLauncher, EventRouter};
use session::handler::ActiveGames;

/// Ask the platform who we are until it answers.
async fn own_identity(platform: &dyn Platform, retry_delay: Duration) -> String {
    loop {
        match platform.own_identity().await {
            Ok(account) => return account,
            Err(e) => {
                warn!("Could not fetch own account, retrying in {:?}: {}", retry_delay, e);
                actix_rt::time::sleep(retry_delay).await;
            }
        }
    }
}

#[actix_rt::main]
async fn main() -> Result<(), ConfigError> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = BotConfig::from_env()?;
    let client = LichessClient::new(&config.base_url, &config.token)
        .map_err(|e| ConfigError::Client(e.to_string()))?;
    let platform: Arc<dyn Platform> = Arc::new(client);
    let notifier = notify::from_settings(config.telegram.clone());
    info!("Engine path: {}", config.engine.path);

    let account = own_identity(platform.as_ref(), config.reconnect_delay).await;
    info!("Logged in as {}", account);
    notify::spawn_notify(&notifier, format!("Bot online as {}", account));

    let memory = OpponentMemory::new();
    let active = ActiveGames::new();

    let matchmaker = Matchmaker::new(
        &account,
        Arc::clone(&platform),
        Arc::clone(&notifier),
        memory.clone(),
        config.matchmaking.clone(),
    );
    actix_rt::spawn(matchmaker.run());

    let launcher = Arc::new(ActorLauncher {
        account: account.clone(),
        base_url: config.base_url.clone(),
        platform: Arc::clone(&platform),
        notifier,
        memory,
        engine: config.engine.clone(),
        settings: config.session.clone(),
        active: active.clone(),
    });
    EventRouter::new(&account, platform, launcher, active, config.reconnect_delay)
        .run()
        .await;
    Ok(())
}
