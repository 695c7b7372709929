use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::notifications::senders::NotificationSender;
use crate::store::SharedUserStore;

pub mod error;
pub mod models;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedUserStore,
    pub sender: Arc<dyn NotificationSender>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .merge(routes::create_message_router())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(app_state))
}
