//! Telegram Bot API notifier.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Notifier, NotifyError};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiReply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self, NotifyError> {
        Self::with_api_base(bot_token, chat_id, DEFAULT_API_BASE)
    }

    pub fn with_api_base(bot_token: &str, chat_id: &str, api_base: &str) -> Result<Self, NotifyError> {
        if bot_token.trim().is_empty() {
            return Err(NotifyError::Config("bot token is empty".into()));
        }
        if chat_id.trim().is_empty() {
            return Err(NotifyError::Config("chat id is empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
            chat_id: chat_id.trim().to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    async fn try_send(&self, text: &str) -> Result<ApiReply, reqwest::Error> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        self.client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await?
            .json::<ApiReply>()
            .await
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str) -> bool {
        match self.try_send(text).await {
            Ok(reply) if reply.ok => {
                tracing::debug!(length = text.len(), "telegram message sent");
                true
            }
            Ok(reply) => {
                tracing::warn!(
                    reason = reply.description.as_deref().unwrap_or("unknown"),
                    "telegram rejected message"
                );
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "telegram send failed");
                false
            }
        }
    }
}
