use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::notifications::models::ParseMode;
use crate::notifications::senders::SenderError;
use crate::web::{
    AppError, AppState,
    models::{SendMessageRequest, StatusResponse},
};

const MISSING_FIELDS: &str = "Missing plugin_id or message.";

pub fn create_message_router() -> Router<Arc<AppState>> {
    Router::new().route("/send_message", post(send_message))
}

async fn send_message(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection, "Rejected malformed send_message body.");
        AppError::BadRequest(MISSING_FIELDS.to_string())
    })?;

    let (plugin_id, message) = match (payload.plugin_id, payload.message) {
        (Some(plugin_id), Some(message)) if !plugin_id.is_empty() && !message.is_empty() => {
            (plugin_id, message)
        }
        _ => return Err(AppError::BadRequest(MISSING_FIELDS.to_string())),
    };

    // Only the canonical hyphenated lowercase form handed out at registration matches.
    let recipient = match Uuid::parse_str(&plugin_id) {
        Ok(id) if id.hyphenated().to_string() == plugin_id => app_state
            .store
            .lock()
            .await
            .find_by_plugin_id(&id)
            .map(|user| (user.chat_id, user.subscribed)),
        _ => None,
    };
    let Some((chat_id, subscribed)) = recipient else {
        return Err(AppError::NotFound("User not found.".to_string()));
    };

    if !subscribed {
        warn!(%plugin_id, "User is unsubscribed. Message not sent.");
        return Err(AppError::Conflict(format!(
            "User with UUID {plugin_id} is unsubscribed."
        )));
    }

    match app_state
        .sender
        .send(chat_id, &message, Some(ParseMode::Html))
        .await
    {
        Ok(()) => {
            info!(%plugin_id, "Telegram message sent.");
            Ok(Json(StatusResponse::success(format!(
                "Message sent to {plugin_id}."
            ))))
        }
        Err(SenderError::Status { status, body }) => {
            error!(%plugin_id, status = status.as_u16(), %body, "Failed to send message.");
            Err(AppError::Upstream(format!(
                "Failed to send message to {plugin_id}. Status code: {}.",
                status.as_u16()
            )))
        }
        Err(e) => {
            error!(%plugin_id, error = %e, "An error occurred while sending the message.");
            Err(AppError::Upstream(format!(
                "An error occurred while sending the message: {e}."
            )))
        }
    }
}
