use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{NotificationSender, SenderError};
use crate::notifications::models::{
    ApiResponse, GetUpdatesRequest, ParseMode, TelegramMessage, Update,
};

/// Extra time the HTTP client waits beyond the server-side long-poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// A client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramSender {
    client: Client,
    api_url: String,
    bot_token: String,
    send_timeout: Duration,
}

impl TelegramSender {
    pub fn new(
        api_url: impl Into<String>,
        bot_token: impl Into<String>,
        send_timeout: Duration,
    ) -> Result<Self, SenderError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            bot_token: bot_token.into(),
            send_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.bot_token, method)
    }

    /// Long-polls for new updates. `timeout` is passed to Telegram as the
    /// server-side wait; the request itself is allowed slightly longer.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, SenderError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: &["message"],
        };
        let updates: Option<Vec<Update>> = self
            .call("getUpdates", &request, timeout + POLL_GRACE)
            .await?;
        Ok(updates.unwrap_or_default())
    }

    async fn call<P, R>(
        &self,
        method: &str,
        payload: &P,
        timeout: Duration,
    ) -> Result<Option<R>, SenderError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        // reqwest errors carry the request URL, which embeds the bot token.
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| SenderError::NetworkError(e.without_url()))?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(SenderError::Status { status, body });
        }

        let body: ApiResponse<R> = response
            .json()
            .await
            .map_err(|e| SenderError::NetworkError(e.without_url()))?;
        if !body.ok {
            return Err(SenderError::Api(
                body.description
                    .unwrap_or_else(|| "no description".to_string()),
            ));
        }
        Ok(body.result)
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), SenderError> {
        let payload = TelegramMessage {
            chat_id,
            text,
            parse_mode,
        };
        let _: Option<serde_json::Value> =
            self.call("sendMessage", &payload, self.send_timeout).await?;
        Ok(())
    }
}

/// Escapes text for Telegram MarkdownV2.
/// Characters to escape: _ * [ ] ( ) ~ ` > # + - = | { } . ! \
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped_text = String::with_capacity(text.len());
    for char_to_escape in text.chars() {
        match char_to_escape {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
            | '{' | '}' | '.' | '!' | '\\' => {
                escaped_text.push('\\');
                escaped_text.push(char_to_escape);
            }
            _ => {
                escaped_text.push(char_to_escape);
            }
        }
    }
    escaped_text
}
