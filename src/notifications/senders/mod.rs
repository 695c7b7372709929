use async_trait::async_trait;
use thiserror::Error;

use super::models::ParseMode;

pub mod telegram;

#[cfg(test)]
pub(crate) mod mock;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Telegram API returned non-success status: {status}. Body: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Telegram API rejected the request: {0}")]
    Api(String),
}

/// Delivers a text message to a chat on the messaging platform.
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Sends `text` to `chat_id`.
    ///
    /// # Arguments
    ///
    /// * `chat_id` - The platform chat to deliver to.
    /// * `text` - The message body, already formatted for `parse_mode`.
    /// * `parse_mode` - How the platform should interpret markup in `text`,
    ///             or `None` for plain text.
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), SenderError>;
}
