use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::notifications::models::Update;
use crate::notifications::senders::NotificationSender;
use crate::notifications::senders::telegram::TelegramSender;
use crate::store::SharedUserStore;

pub mod commands;

use commands::{Command, handle_command};

/// Pause after a failed getUpdates call before polling again.
const POLL_ERROR_DELAY: Duration = Duration::from_secs(3);

/// Long-polls Telegram for chat commands and answers them.
pub struct BotService {
    client: TelegramSender,
    store: SharedUserStore,
    poll_timeout: Duration,
}

impl BotService {
    pub fn new(client: TelegramSender, store: SharedUserStore, poll_timeout: Duration) -> Self {
        Self {
            client,
            store,
            poll_timeout,
        }
    }

    /// Runs until `shutdown` changes or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_timeout_secs = self.poll_timeout.as_secs(), "Bot polling started.");
        let mut offset: Option<i64> = None;

        loop {
            let result = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.client.get_updates(offset, self.poll_timeout) => result,
            };

            match result {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        dispatch_update(&self.store, &self.client, &update).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Polling for updates failed.");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(POLL_ERROR_DELAY) => {}
                    }
                }
            }
        }

        info!("Bot polling stopped.");
    }
}

/// Handles one update: runs the command it carries, if any, and sends the
/// reply back to the originating chat. Send failures are only logged.
pub async fn dispatch_update(
    store: &SharedUserStore,
    sender: &dyn NotificationSender,
    update: &Update,
) {
    let Some(message) = &update.message else {
        return;
    };
    let Some(command) = message.text.as_deref().and_then(Command::parse) else {
        debug!(update_id = update.update_id, "Ignoring non-command update.");
        return;
    };

    let chat_id = message.chat.id;
    debug!(chat_id, ?command, "Handling command.");
    let reply = handle_command(store, chat_id, command).await;

    if let Err(e) = sender.send(chat_id, &reply.text, reply.parse_mode).await {
        warn!(chat_id, ?command, error = %e, "Failed to send reply.");
    }
}
