// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User directory.
//!
//! The authentication pipeline looks users up by identifier (the email
//! address used as token subject). Accounts are seeded from a JSON file at
//! startup and registration adds new ones at runtime. Registered accounts
//! live in memory only.
//!
//! ## Seed file format
//!
//! ```json
//! [
//!   {
//!     "id": "5f0c...",
//!     "name": "Alice",
//!     "email": "alice@example.com",
//!     "password_hash": "$argon2id$v=19$...",
//!     "role": "admin"
//!   }
//! ]
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Role;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to read user directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid user directory file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate user email: {0}")]
    Duplicate(String),

    #[error("user directory unavailable: {0}")]
    Unavailable(String),
}

/// Stored account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
}

/// User lookup and creation, keyed by case-insensitive email.
pub trait UserDirectory: Send + Sync {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Add a new account. Fails with [`DirectoryError::Duplicate`] if the
    /// email is taken; the check and the write are atomic.
    fn insert(&self, record: UserRecord) -> Result<(), DirectoryError>;
}

/// Directory held in memory.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new(records: Vec<UserRecord>) -> Result<Self, DirectoryError> {
        let mut users = HashMap::with_capacity(records.len());
        for record in records {
            let key = normalize(&record.email);
            if users.contains_key(&key) {
                return Err(DirectoryError::Duplicate(record.email));
            }
            users.insert(key, record);
        }
        Ok(Self {
            users: RwLock::new(users),
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<UserRecord> = serde_json::from_str(&raw)?;
        Self::new(records)
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&normalize(email)).cloned())
    }

    fn insert(&self, record: UserRecord) -> Result<(), DirectoryError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let key = normalize(&record.email);
        if users.contains_key(&key) {
            return Err(DirectoryError::Duplicate(record.email));
        }
        users.insert(key, record);
        Ok(())
    }
}

fn poisoned() -> DirectoryError {
    DirectoryError::Unavailable("user directory lock poisoned".to_string())
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Placeholder hash for records that never log in.
    pub const UNUSABLE_HASH: &str = "!";

    pub fn user(email: &str, role: Role) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            password_hash: UNUSABLE_HASH.to_string(),
            role,
        }
    }

    /// Directory whose every operation fails.
    pub struct BrokenDirectory;

    impl UserDirectory for BrokenDirectory {
        fn find_by_email(&self, _email: &str) -> Result<Option<UserRecord>, DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }

        fn insert(&self, _record: UserRecord) -> Result<(), DirectoryError> {
            Err(DirectoryError::Unavailable("connection refused".to_string()))
        }
    }
}
