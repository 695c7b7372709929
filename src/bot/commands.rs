use tracing::{error, info};
use uuid::Uuid;

use crate::notifications::models::ParseMode;
use crate::notifications::senders::telegram::escape_markdown_v2;
use crate::store::{Registration, SharedUserStore, StoreError};

pub const HELP_TEXT: &str = "Available commands:
/start - Register new UUID for your user.
/stop - Unsubscribe from messages.
/remove - Remove your data completely.
/myid - Prints your UUID if it exists.
/help - Prints this info.";

const NOT_REGISTERED: &str = "You are not registered!";
const INTERNAL_ERROR: &str = "Something went wrong, please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Register,
    Unsubscribe,
    Remove,
    WhoAmI,
    Help,
}

impl Command {
    /// Parses the leading bot command of a message, e.g. `/start` or
    /// `/start@SomeBot extra words`. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Register),
            "stop" => Some(Command::Unsubscribe),
            "remove" => Some(Command::Remove),
            "myid" => Some(Command::WhoAmI),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Text sent back to the chat that issued a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub parse_mode: Option<ParseMode>,
}

impl Reply {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            parse_mode: None,
        }
    }

    /// Escaped prose followed by the id as inline code.
    fn with_id(prose: &str, plugin_id: &Uuid) -> Self {
        Self {
            text: format!("{}`{plugin_id}`", escape_markdown_v2(prose)),
            parse_mode: Some(ParseMode::MarkdownV2),
        }
    }
}

/// Applies `command` for `chat_id` and returns the reply to send.
/// Store failures are logged and answered with a generic apology.
pub async fn handle_command(store: &SharedUserStore, chat_id: i64, command: Command) -> Reply {
    match apply(store, chat_id, command).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(chat_id, ?command, error = %e, "Failed to persist user change.");
            Reply::plain(INTERNAL_ERROR)
        }
    }
}

async fn apply(store: &SharedUserStore, chat_id: i64, command: Command) -> Result<Reply, StoreError> {
    let reply = match command {
        Command::Register => {
            let registration = store.lock().await.register(chat_id)?;
            match registration {
                Registration::Created(record) => {
                    info!(chat_id, plugin_id = %record.plugin_id, "Registered new user.");
                    Reply::with_id("Registration complete! Your UUID: ", &record.plugin_id)
                }
                Registration::Resubscribed(record) => {
                    info!(chat_id, plugin_id = %record.plugin_id, "User resubscribed.");
                    Reply::with_id(
                        "Welcome back! You resubscribed. Your UUID: ",
                        &record.plugin_id,
                    )
                }
                Registration::AlreadyRegistered(record) => {
                    Reply::with_id("You are already registered with UUID ", &record.plugin_id)
                }
            }
        }
        Command::Unsubscribe => match store.lock().await.unsubscribe(chat_id)? {
            Some(record) => {
                info!(chat_id, plugin_id = %record.plugin_id, "User unsubscribed.");
                Reply::plain("You have been unsubscribed.")
            }
            None => Reply::plain(NOT_REGISTERED),
        },
        Command::Remove => match store.lock().await.remove(chat_id)? {
            Some(record) => {
                info!(chat_id, plugin_id = %record.plugin_id, "User removed.");
                Reply::plain("You have been completely removed from the system.")
            }
            None => Reply::plain("You are not registered, so nothing to remove!"),
        },
        Command::WhoAmI => match store.lock().await.find_by_chat_id(chat_id) {
            Some(record) => Reply {
                text: format!("*Your UUID is:*\n\n`{}`", record.plugin_id),
                parse_mode: Some(ParseMode::MarkdownV2),
            },
            None => Reply::plain(NOT_REGISTERED),
        },
        Command::Help => Reply::plain(HELP_TEXT),
    };
    Ok(reply)
}
