use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::models::events::{ChallengeTarget, GameEvent, IncomingEvent, OngoingGame, OnlineUser};
use crate::platform::{ndjson, EventStream, MoveOutcome, Platform, PlatformError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct Account {
    username: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Playing {
    #[serde(default)]
    now_playing: Vec<OngoingGame>,
}

/// Lichess Bot API over HTTPS with bearer authentication
#[derive(Clone)]
pub struct LichessClient {
    http: Client,
    base_url: String,
    token: String,
}

impl LichessClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, PlatformError> {
        // No overall timeout here: the event streams stay open for hours.
        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
    }

    async fn send(request: RequestBuilder) -> Result<Response, PlatformError> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(PlatformError::Status { status, body })
    }

    async fn open_stream<T>(&self, path: &str) -> Result<EventStream<T>, PlatformError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        debug!("Opening stream {}", path);
        let response = Self::send(self.get(path)).await?;
        Ok(ndjson::decode(response.bytes_stream()))
    }
}

#[async_trait]
impl Platform for LichessClient {
    async fn stream_incoming_events(&self) -> Result<EventStream<IncomingEvent>, PlatformError> {
        self.open_stream("/api/stream/event").await
    }

    async fn stream_game_state(&self, game_id: &str) -> Result<EventStream<GameEvent>, PlatformError> {
        self.open_stream(&format!("/api/bot/game/stream/{}", game_id)).await
    }

    async fn accept_challenge(&self, challenge_id: &str) -> Result<(), PlatformError> {
        Self::send(self.post(&format!("/api/challenge/{}/accept", challenge_id))).await?;
        Ok(())
    }

    async fn create_challenge(&self, target: &ChallengeTarget) -> Result<(), PlatformError> {
        let form = [
            ("rated", target.rated.to_string()),
            ("clock.limit", target.clock_limit_secs.to_string()),
            ("clock.increment", target.clock_increment_secs.to_string()),
            ("color", target.color.as_str().to_string()),
        ];
        let request = self
            .post(&format!("/api/challenge/{}", target.opponent))
            .form(&form);
        Self::send(request).await?;
        Ok(())
    }

    async fn ongoing_games(&self) -> Result<Vec<OngoingGame>, PlatformError> {
        let response = Self::send(self.get("/api/account/playing").timeout(REQUEST_TIMEOUT)).await?;
        let playing: Playing = response.json().await?;
        Ok(playing.now_playing)
    }

    async fn online_opponents(&self, limit: usize) -> Result<Vec<OnlineUser>, PlatformError> {
        let request = self
            .get(&format!("/api/bot/online?nb={}", limit))
            .timeout(REQUEST_TIMEOUT);
        let response = Self::send(request).await?;
        let mut users = ndjson::decode::<OnlineUser, _, _, _>(response.bytes_stream());
        let mut online = Vec::new();
        while let Some(user) = users.next().await {
            online.push(user?);
        }
        Ok(online)
    }

    async fn make_move(&self, game_id: &str, uci: &str) -> Result<MoveOutcome, PlatformError> {
        let request = self.post(&format!("/api/bot/game/{}/move/{}", game_id, uci));
        match Self::send(request).await {
            Ok(_) => Ok(MoveOutcome::Accepted),
            Err(PlatformError::Status { status, body })
                if status == StatusCode::BAD_REQUEST.as_u16()
                    && body.to_lowercase().contains("not your turn") =>
            {
                Ok(MoveOutcome::RejectedNotMyTurn)
            }
            Err(err) => Err(err),
        }
    }

    async fn accept_draw(&self, game_id: &str) -> Result<(), PlatformError> {
        Self::send(self.post(&format!("/api/bot/game/{}/draw/yes", game_id))).await?;
        Ok(())
    }

    async fn own_identity(&self) -> Result<String, PlatformError> {
        let response = Self::send(self.get("/api/account").timeout(REQUEST_TIMEOUT)).await?;
        let account: Account = response.json().await?;
        Ok(account.username)
    }
}
