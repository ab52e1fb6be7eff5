//! Telegram Bot API outbound port.
//!
//! Minimal HTTP glue implementing [`ChannelOutboundPort`] against
//! `api.telegram.org`. The channel boundary only ever needs `sendMessage`
//! and `setMessageReaction`.

use std::time::Duration;

use serde::Deserialize;

use ar_domain::error::{normalize_provider_failure, Error, Result};

use crate::boundary::ChannelOutboundPort;

/// Request timeout applied to every Bot API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TelegramBotApi {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramBotApi {
    pub fn new(token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(format!("building telegram client: {e}")))?;
        Ok(Self {
            http,
            base_url: format!("https://api.telegram.org/bot{token}"),
        })
    }

    /// Point the client at a different host (tests, self-hosted Bot API).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/{method}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| normalize_provider_failure("telegram", None, &format!("network: {e}")))?;

        let status = resp.status().as_u16();
        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| Error::Other(format!("telegram response parse: {e}")))?;

        if !parsed.ok {
            let description = parsed.description.unwrap_or_else(|| "unknown".into());
            return Err(normalize_provider_failure(
                "telegram",
                Some(status),
                &description,
            ));
        }
        parsed
            .result
            .ok_or_else(|| Error::Other("telegram response missing result".into()))
    }
}

#[async_trait::async_trait]
impl ChannelOutboundPort for TelegramBotApi {
    async fn send_text(
        &self,
        channel_id: &str,
        text: &str,
        thread_hint: Option<&str>,
    ) -> Result<String> {
        let mut body = serde_json::json!({
            "chat_id": channel_id,
            "text": text,
        });
        if let Some(thread) = thread_hint {
            // The Bot API wants a numeric topic id.
            body["message_thread_id"] = match thread.parse::<i64>() {
                Ok(n) => n.into(),
                Err(_) => thread.into(),
            };
        }
        let sent: SentMessage = self.call("sendMessage", body).await?;
        Ok(sent.message_id.to_string())
    }

    async fn send_reaction(
        &self,
        channel_id: &str,
        target_message_id: &str,
        reaction: &str,
    ) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": channel_id,
            "message_id": target_message_id,
            "reaction": [{"type": "emoji", "emoji": reaction}],
        });
        let _: serde_json::Value = self.call("setMessageReaction", body).await?;
        Ok(())
    }
}
