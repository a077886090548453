//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! YAML user files

use crate::config::StorageConfig;
use emberhold_common::user::{validate_password, validate_username};
use emberhold_common::{UserRecord, ValidationError};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const EXTENSION: &str = "yaml";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed user file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One file per user under a data directory, named by lowercase username
pub struct UserStore {
    root: PathBuf,
    careful_save: bool,
    cost: u32,
    create_lock: Mutex<()>,
}

impl UserStore {
    pub fn new(root: impl Into<PathBuf>, careful_save: bool, cost: u32) -> Self {
        Self {
            root: root.into(),
            careful_save,
            cost,
            create_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.user_data.as_path(), config.careful_save, config.password_cost)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the data directory if it is missing
    pub async fn init(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn path_for(&self, username: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", username.to_lowercase(), EXTENSION))
    }

    pub async fn exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.path_for(username)).await?)
    }

    pub async fn load(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let data = match tokio::fs::read(self.path_for(username)).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_yaml::from_slice(&data)?))
    }

    /// Write a record. A careful save writes `<file>.new` and renames it
    /// over the original so a failed write never truncates the old file.
    pub async fn save(&self, record: &UserRecord) -> Result<(), StoreError> {
        let data = serde_yaml::to_string(record)?;
        let path = self.path_for(&record.username);
        if self.careful_save {
            let mut temp = path.clone().into_os_string();
            temp.push(".new");
            tokio::fs::write(&temp, data).await?;
            tokio::fs::rename(&temp, &path).await?;
        } else {
            tokio::fs::write(&path, data).await?;
        }
        tracing::debug!(user_id = record.user_id, username = %record.username, careful = self.careful_save, "Saved user");
        Ok(())
    }

    /// Number of stored users
    pub async fn count(&self) -> Result<usize, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Validate, hash and persist a new user
    pub async fn create(
        &self,
        username: &str,
        password: &str,
        start_room: i64,
    ) -> Result<UserRecord, StoreError> {
        validate_username(username)?;
        validate_password(password)?;

        let _guard = self.create_lock.lock().await;
        if self.exists(username).await? {
            return Err(StoreError::UsernameTaken(username.to_string()));
        }
        self.init().await?;

        let user_id = self.count().await? as u64 + 1;
        let password = password.to_string();
        let cost = self.cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        let record = UserRecord::new(user_id, username, hash, start_room);
        self.save(&record).await?;
        tracing::info!(user_id, username, "Created user");
        Ok(record)
    }

    pub async fn verify_password(
        &self,
        record: &UserRecord,
        password: &str,
    ) -> Result<bool, StoreError> {
        let password = password.to_string();
        let hash = record.password_hash.clone();
        Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
    }
}
