// src/services/telegram.rs

//! Telegram Bot API channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Destination, TelegramConfig};
use crate::services::channel::{Channel, ChannelError};

const PARSE_MODE: &str = "Markdown";

/// Wait used when a 429 arrives without a `retry_after` hint.
const DEFAULT_RETRY_AFTER: u64 = 1;

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize, Default)]
struct ApiReply {
    #[serde(default)]
    ok: bool,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ReplyParameters>,
}

#[derive(Deserialize)]
struct ReplyParameters {
    retry_after: Option<u64>,
}

/// Sends messages and documents through a bot.
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call(&self, request: RequestBuilder) -> std::result::Result<(), ChannelError> {
        let response = request
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.without_url().to_string()))?;
        let status = response.status();

        let reply = match response.json::<ApiReply>().await {
            Ok(reply) => reply,
            Err(_) if status.is_success() => return Ok(()),
            Err(_) => ApiReply::default(),
        };
        if status.is_success() && reply.ok {
            return Ok(());
        }

        if let Some(retry_after) = reply.parameters.and_then(|p| p.retry_after) {
            return Err(ChannelError::RateLimited { retry_after });
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ChannelError::RateLimited {
                retry_after: DEFAULT_RETRY_AFTER,
            });
        }
        Err(ChannelError::Rejected {
            code: reply.error_code.unwrap_or(status.as_u16()),
            description: reply.description.unwrap_or_else(|| status.to_string()),
        })
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    async fn send_text(&self, to: &Destination, text: &str) -> std::result::Result<(), ChannelError> {
        let body = SendMessage {
            chat_id: to.chat,
            message_thread_id: to.thread,
            text,
            parse_mode: PARSE_MODE,
        };
        self.call(self.client.post(self.endpoint("sendMessage")).json(&body))
            .await
    }

    async fn send_document(
        &self,
        to: &Destination,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> std::result::Result<(), ChannelError> {
        let mut form = Form::new()
            .text("chat_id", to.chat.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", PARSE_MODE)
            .part(
                "document",
                Part::bytes(bytes).file_name(filename.to_string()),
            );
        if let Some(thread) = to.thread {
            form = form.text("message_thread_id", thread.to_string());
        }
        self.call(self.client.post(self.endpoint("sendDocument")).multipart(form))
            .await
    }
}
