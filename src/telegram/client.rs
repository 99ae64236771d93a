//! Telegram Bot API client
//!
//! Thin wrapper over the `sendMessage` endpoint with retry and backoff.
//! Alert delivery is the last step of a scan cycle, so failures here are
//! surfaced to the caller; an alert is only recorded as sent when the API
//! acknowledged it.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

const API_BASE_URL: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram client bound to one bot token and chat.
pub struct TelegramClient {
    http_client: Client,
    // full bot URL, contains the token: never log this
    api_base: String,
    chat_id: String,
    max_retries: u32,
}

impl TelegramClient {
    pub fn new(bot_token: &str, chat_id: impl Into<String>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            api_base: format!("{}/bot{}", API_BASE_URL, bot_token),
            chat_id: chat_id.into(),
            max_retries: MAX_RETRIES,
        })
    }

    /// Build a client from TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID.
    pub fn from_env() -> Result<Self> {
        let bot_token =
            std::env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN not set")?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").context("TELEGRAM_CHAT_ID not set")?;
        Self::new(&bot_token, chat_id)
    }

    /// Send a Markdown message, retrying with exponential backoff
    /// (1s, 2s, 4s between attempts).
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.api_base);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(2u64.pow(attempt - 1));
                debug!("Retrying Telegram send after {:?}", backoff);
                sleep(backoff).await;
            }

            match self.try_send(&url, &payload).await {
                Ok(()) => {
                    debug!("Telegram message sent ({} chars)", text.chars().count());
                    return Ok(());
                }
                Err(e) => {
                    warn!("Telegram send attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("Telegram send failed after retries")))
    }

    async fn try_send(&self, url: &str, payload: &serde_json::Value) -> Result<()> {
        let response = self
            .http_client
            .post(url)
            .json(payload)
            .send()
            .await
            .context("Failed to reach Telegram API")?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .context("Failed to decode Telegram response")?;

        if !body.ok {
            bail!(
                "Telegram API error ({}): {}",
                status,
                body.description.as_deref().unwrap_or("no description")
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_shapes() {
        let ok: ApiResponse =
            serde_json::from_str(r#"{"ok": true, "result": {"message_id": 42}}"#).unwrap();
        assert!(ok.ok);

        let err: ApiResponse = serde_json::from_str(
            r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#,
        )
        .unwrap();
        assert!(!err.ok);
        assert_eq!(err.description.as_deref(), Some("Bad Request: chat not found"));
    }
}
