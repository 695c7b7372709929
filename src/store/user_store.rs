use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use super::StoreError;
use super::models::{Registration, UserRecord, UsersFile};

/// All registered users, kept in memory and mirrored to a JSON file.
///
/// Every mutating method saves the new table before reporting success; if the
/// save fails the previous table is restored.
#[derive(Debug)]
pub struct UserStore {
    path: PathBuf,
    users: Vec<UserRecord>,
}

impl UserStore {
    /// Loads the user file at `path`. A missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let users = match fs::read_to_string(&path) {
            Ok(contents) => {
                let file: UsersFile =
                    serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                file.users
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "User file not found, starting with an empty store.");
                Vec::new()
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };

        check_unique(&path, &users)?;
        info!(path = %path.display(), count = users.len(), "Loaded users.");
        Ok(Self { path, users })
    }

    pub fn records(&self) -> &[UserRecord] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn find_by_chat_id(&self, chat_id: i64) -> Option<&UserRecord> {
        self.users.iter().find(|user| user.chat_id == chat_id)
    }

    pub fn find_by_plugin_id(&self, plugin_id: &Uuid) -> Option<&UserRecord> {
        self.users.iter().find(|user| &user.plugin_id == plugin_id)
    }

    /// Draws random v4 UUIDs until one is not in use.
    pub fn generate_unique_plugin_id(&self) -> Uuid {
        loop {
            let candidate = Uuid::new_v4();
            if self.find_by_plugin_id(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Replaces the user file with the current table via a temp file and rename.
    pub fn save(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent)?;
                parent
            }
            _ => Path::new("."),
        };

        let file = UsersFile {
            users: self.users.clone(),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &file)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        debug!(path = %self.path.display(), count = self.users.len(), "Saved users.");
        Ok(())
    }

    /// Registers `chat_id`, resubscribing it if it already exists.
    pub fn register(&mut self, chat_id: i64) -> Result<Registration, StoreError> {
        if let Some(existing) = self.find_by_chat_id(chat_id) {
            if existing.subscribed {
                return Ok(Registration::AlreadyRegistered(existing.clone()));
            }
            let record = UserRecord {
                subscribed: true,
                ..existing.clone()
            };
            self.replace(record.clone())?;
            return Ok(Registration::Resubscribed(record));
        }

        let record = UserRecord {
            chat_id,
            plugin_id: self.generate_unique_plugin_id(),
            subscribed: true,
        };
        let mut users = self.users.clone();
        users.push(record.clone());
        self.commit(users)?;
        Ok(Registration::Created(record))
    }

    /// Marks `chat_id` as unsubscribed. Returns `None` if it is not registered.
    pub fn unsubscribe(&mut self, chat_id: i64) -> Result<Option<UserRecord>, StoreError> {
        let Some(existing) = self.find_by_chat_id(chat_id) else {
            return Ok(None);
        };
        let record = UserRecord {
            subscribed: false,
            ..existing.clone()
        };
        self.replace(record.clone())?;
        Ok(Some(record))
    }

    /// Deletes the record for `chat_id`, returning it if there was one.
    pub fn remove(&mut self, chat_id: i64) -> Result<Option<UserRecord>, StoreError> {
        let Some(position) = self.users.iter().position(|user| user.chat_id == chat_id) else {
            return Ok(None);
        };
        let mut users = self.users.clone();
        let removed = users.remove(position);
        self.commit(users)?;
        Ok(Some(removed))
    }

    fn replace(&mut self, record: UserRecord) -> Result<(), StoreError> {
        let users = self
            .users
            .iter()
            .map(|user| {
                if user.chat_id == record.chat_id {
                    record.clone()
                } else {
                    user.clone()
                }
            })
            .collect();
        self.commit(users)
    }

    fn commit(&mut self, users: Vec<UserRecord>) -> Result<(), StoreError> {
        let previous = std::mem::replace(&mut self.users, users);
        if let Err(e) = self.save() {
            self.users = previous;
            return Err(e);
        }
        Ok(())
    }
}

fn check_unique(path: &Path, users: &[UserRecord]) -> Result<(), StoreError> {
    let mut chat_ids = HashSet::new();
    let mut plugin_ids = HashSet::new();
    for user in users {
        if !chat_ids.insert(user.chat_id) {
            return Err(StoreError::Duplicate {
                path: path.to_path_buf(),
                field: "telegram_id",
                value: user.chat_id.to_string(),
            });
        }
        if !plugin_ids.insert(user.plugin_id) {
            return Err(StoreError::Duplicate {
                path: path.to_path_buf(),
                field: "plugin_id",
                value: user.plugin_id.to_string(),
            });
        }
    }
    Ok(())
}
