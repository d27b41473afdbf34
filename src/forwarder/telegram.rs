use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ContactPoint, ParseMode, TelegramContactPoint};
use crate::error::ForwardError;
use crate::message::Message;

use super::render;
use super::Forwarder;

const API_BASE: &str = "https://api.telegram.org";

/// Telegram caps message text at 4096 characters; longer renderings are
/// split and sent as consecutive messages.
const TEXT_SIZE_LIMIT: usize = 4096;

pub struct TelegramForwarder {
    http: reqwest::Client,
    api_base: String,
}

impl TelegramForwarder {
    pub fn new() -> Self {
        TelegramForwarder {
            http: reqwest::Client::new(),
            api_base: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_base(api_base: &str) -> Self {
        TelegramForwarder {
            http: reqwest::Client::new(),
            api_base: api_base.to_string(),
        }
    }

    async fn send_message(
        &self,
        contact: &TelegramContactPoint,
        text: &str,
    ) -> Result<(), ForwardError> {
        let request = SendMessageRequest {
            chat_id: contact.chat_id,
            parse_mode: contact.parse_mode.unwrap_or(ParseMode::MarkdownV2).as_str(),
            text,
            disable_notification: contact.silent_mode,
            protect_content: contact.disable_forwarding,
        };

        let response: ApiResponse = self
            .http
            .post(format!(
                "{}/bot{}/sendMessage",
                self.api_base, contact.bot_token
            ))
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(ForwardError::Api {
                code: response.error_code.unwrap_or_default(),
                description: response.description.unwrap_or_default(),
            });
        }

        Ok(())
    }
}

impl Default for TelegramForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl Forwarder for TelegramForwarder {
    async fn forward(
        &self,
        contact: &ContactPoint,
        messages: &[Message],
    ) -> Result<(), ForwardError> {
        let ContactPoint::Telegram(telegram) = contact;

        for message in messages {
            let text = render::render(message, telegram.template.as_deref());
            for chunk in render::chunks(&text, TEXT_SIZE_LIMIT) {
                self.send_message(telegram, chunk).await?;
            }
            debug!(
                uid = message.uid,
                chat_id = telegram.chat_id,
                "message forwarded"
            );
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    parse_mode: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    disable_notification: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    protect_content: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    error_code: Option<i64>,
}
