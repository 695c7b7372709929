use async_trait::async_trait;
use std::sync::Mutex;

use super::{NotificationSender, SenderError};
use crate::notifications::models::ParseMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub parse_mode: Option<ParseMode>,
}

#[derive(Clone)]
enum Failure {
    Api(String),
    Status(reqwest::StatusCode),
}

/// Records every message instead of sending it.
#[derive(Default)]
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<SentMessage>>,
    failure: Option<Failure>,
}

impl RecordingSender {
    /// A sender whose every call fails with `SenderError::Api(reason)`.
    pub fn failing(reason: &str) -> Self {
        Self {
            sent: Mutex::default(),
            failure: Some(Failure::Api(reason.to_string())),
        }
    }

    /// A sender whose every call fails as if the platform answered `status`.
    pub fn failing_with_status(status: reqwest::StatusCode) -> Self {
        Self {
            sent: Mutex::default(),
            failure: Some(Failure::Status(status)),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), SenderError> {
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            parse_mode,
        });
        match self.failure.clone() {
            Some(Failure::Api(reason)) => Err(SenderError::Api(reason)),
            Some(Failure::Status(status)) => Err(SenderError::Status {
                status,
                body: "Forbidden: bot was blocked by the user".to_string(),
            }),
            None => Ok(()),
        }
    }
}
