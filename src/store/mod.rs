use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

pub mod models;
pub mod user_store;

pub use models::{Registration, UserRecord};
pub use user_store::UserStore;

/// The store as shared between the bot loop and the HTTP handlers.
pub type SharedUserStore = Arc<Mutex<UserStore>>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read user file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("User file {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("User file {path:?} lists {field} {value} more than once")]
    Duplicate {
        path: PathBuf,
        field: &'static str,
        value: String,
    },
    #[error("Failed to serialize users: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write user file: {0}")]
    Write(#[from] std::io::Error),
    #[error("Failed to replace user file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
