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

//! User record types

use crate::character::Character;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric user identifier, stable across sessions
pub type UserId = u64;

pub const MIN_USERNAME_LENGTH: usize = 2;
pub const MAX_USERNAME_LENGTH: usize = 16;
pub const MIN_PASSWORD_LENGTH: usize = 4;
pub const MAX_PASSWORD_LENGTH: usize = 16;

/// Permission tier for access control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Permission {
    /// Check if this tier has at least the specified tier
    pub fn has_permission(&self, required: Permission) -> bool {
        self.level() >= required.level()
    }

    fn level(&self) -> u8 {
        match self {
            Permission::User => 0,
            Permission::Moderator => 1,
            Permission::Admin => 2,
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::User => write!(f, "user"),
            Permission::Moderator => write!(f, "moderator"),
            Permission::Admin => write!(f, "admin"),
        }
    }
}

/// Persisted player record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub permission: Permission,
    pub joined: DateTime<Utc>,
    pub character: Character,
}

impl UserRecord {
    pub fn new(user_id: UserId, username: impl Into<String>, password_hash: impl Into<String>, start_room: i64) -> Self {
        let username = username.into();
        Self {
            user_id,
            character: Character::new(username.clone(), start_room),
            username,
            password_hash: password_hash.into(),
            permission: Permission::User,
            joined: Utc::now(),
        }
    }
}

/// Reasons a username or password is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters")]
    UsernameLength,
    #[error("username must start with a letter and contain only letters, digits or underscores")]
    UsernameCharacters,
    #[error("password must be between {MIN_PASSWORD_LENGTH} and {MAX_PASSWORD_LENGTH} characters")]
    PasswordLength,
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&length) {
        return Err(ValidationError::UsernameLength);
    }
    let mut chars = username.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if !starts_with_letter || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::UsernameCharacters);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return Err(ValidationError::PasswordLength);
    }
    Ok(())
}
