use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TelegramSettings;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort outbound messages. Failures never reach the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _text: &str) {}
}

/// `sendMessage` body. No `parse_mode`: the text goes out verbatim, so
/// names with `_` or `*` cannot break the request.
#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Pushes plain-text messages to a Telegram chat
pub struct TelegramNotifier {
    http: Client,
    settings: TelegramSettings,
}

impl TelegramNotifier {
    pub fn new(settings: TelegramSettings) -> Self {
        Self {
            http: Client::new(),
            settings,
        }
    }

    fn payload<'a>(&'a self, text: &'a str) -> SendMessage<'a> {
        SendMessage {
            chat_id: &self.settings.chat_id,
            text,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.settings.token);
        let payload = self.payload(text);
        let sent = self
            .http
            .post(url)
            .json(&payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        if let Err(e) = sent {
            debug!("Notification dropped: {}", e);
        }
    }
}

/// Telegram when both credentials are configured, otherwise a no-op.
pub fn from_settings(settings: Option<TelegramSettings>) -> Arc<dyn Notifier> {
    match settings {
        Some(settings) => Arc::new(TelegramNotifier::new(settings)),
        None => Arc::new(NoopNotifier),
    }
}

/// Fire a notification without waiting for it.
pub fn spawn_notify(notifier: &Arc<dyn Notifier>, text: String) {
    let notifier = Arc::clone(notifier);
    actix_rt::spawn(async move {
        notifier.notify(&text).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn noop_notifier_swallows_everything() {
        let notifier = from_settings(None);
        notifier.notify("ignored").await;
    }

    #[test]
    fn telegram_text_is_sent_verbatim() {
        let notifier = TelegramNotifier::new(TelegramSettings {
            token: "bot-token".to_string(),
            chat_id: "42".to_string(),
        });
        let text = "Game over\nResult: 1-0 (win vs deep_blue_bot*)";
        let body = serde_json::to_value(notifier.payload(text)).unwrap();

        assert_eq!(body["chat_id"], "42");
        assert_eq!(body["text"], text);
        assert!(body.get("parse_mode").is_none());
    }
}
