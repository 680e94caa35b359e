//! 📱 Telegram Notification Client
//!
//! Delivers rendered messages to a Telegram chat or channel. Failures are
//! reported back to the caller and never retried here.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tokio::sync::RwLock;

/// Why a message could not be delivered
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification credentials are not configured")]
    MissingCredentials,
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Telegram API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Anything that can deliver a text payload to a destination
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError>;
}

/// Telegram Bot API client
pub struct TelegramClient {
    client: Client,
    bot_token: String,
    /// Rate limiting: Track last message timestamp
    last_message_time: Arc<RwLock<Instant>>,
    /// Minimum delay between messages (milliseconds)
    min_message_delay_ms: u64,
}

impl TelegramClient {
    pub fn new(bot_token: String) -> Result<Self, NotifyError> {
        if bot_token.trim().is_empty() {
            return Err(NotifyError::MissingCredentials);
        }

        Ok(TelegramClient {
            client: Client::builder().timeout(Duration::from_secs(10)).build()?,
            bot_token,
            last_message_time: Arc::new(RwLock::new(Instant::now())),
            min_message_delay_ms: 100, // 100ms minimum between messages
        })
    }

    /// Send a raw text message to a chat
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        if chat_id.trim().is_empty() {
            return Err(NotifyError::MissingCredentials);
        }

        // Rate limiting
        {
            let mut last_time = self.last_message_time.write().await;
            let elapsed = last_time.elapsed();
            if elapsed.as_millis() < self.min_message_delay_ms as u128 {
                let wait_time = Duration::from_millis(self.min_message_delay_ms - elapsed.as_millis() as u64);
                tokio::time::sleep(wait_time).await;
            }
            *last_time = Instant::now();
        }

        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let payload = json!({
            "chat_id": chat_id,
            "text": escape_html(text),
            "parse_mode": "HTML"
        });

        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api { status: status.as_u16(), body });
        }

        debug!("📤 Telegram message delivered to {} ({} chars)", chat_id, text.chars().count());
        Ok(())
    }
}

/// Escape the characters Telegram's HTML parse mode treats as markup
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
impl NotificationSink for TelegramClient {
    async fn send(&self, destination: &str, text: &str) -> Result<(), NotifyError> {
        self.send_message(destination, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_telegram_client_creation() {
        let client = TelegramClient::new("test_token".to_string()).unwrap();
        assert_eq!(client.bot_token, "test_token");
        assert_eq!(client.min_message_delay_ms, 100);
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            TelegramClient::new("  ".to_string()),
            Err(NotifyError::MissingCredentials)
        ));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("R&D <Gap Up> trigger: 3 > 2"),
            "R&amp;D &lt;Gap Up&gt; trigger: 3 &gt; 2"
        );
        assert_eq!(escape_html("📊 +12.5%"), "📊 +12.5%");
    }

    #[tokio::test]
    async fn test_empty_chat_id_rejected_before_request() {
        let client = TelegramClient::new("test_token".to_string()).unwrap();
        let result = client.send("", "hello").await;
        assert!(matches!(result, Err(NotifyError::MissingCredentials)));
    }
}
