use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One registered Telegram chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "telegram_id")]
    pub chat_id: i64,
    pub plugin_id: Uuid,
    pub subscribed: bool,
}

/// On-disk layout of the user file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct UsersFile {
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

/// Outcome of a register command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(UserRecord),
    Resubscribed(UserRecord),
    AlreadyRegistered(UserRecord),
}

impl Registration {
    pub fn record(&self) -> &UserRecord {
        match self {
            Registration::Created(record)
            | Registration::Resubscribed(record)
            | Registration::AlreadyRegistered(record) => record,
        }
    }
}
