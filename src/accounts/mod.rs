//! User accounts
//!
//! Registration and login backed by the `users.json` store. Lookups go through an
//! in-memory index; every successful registration rewrites the file.

pub mod password;
pub mod session;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::accounts::{load_users, save_users, UserRecord};
use crate::storage::StorageError;

pub use session::{Session, SessionStore, SESSION_COOKIE};

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("User id already taken")]
    DuplicateUserId,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid user id or password")]
    InvalidCredentials,

    #[error("Account storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Registration form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub email: String,
}

impl NewUser {
    fn validate(&self) -> Result<(), AccountError> {
        let fields = [
            ("user_id", &self.user_id),
            ("password", &self.password),
            ("name", &self.name),
            ("job", &self.job),
            ("email", &self.email),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(AccountError::MissingField(*field)),
            None => Ok(()),
        }
    }
}

/// A user without credentials, safe to return to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicUser {
    pub id: u64,
    pub user_id: String,
    pub name: String,
    pub job: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for PublicUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id.clone(),
            name: record.name.clone(),
            job: record.job.clone(),
            email: record.email.clone(),
            created_at: record.created_at,
        }
    }
}

/// Registered users keyed by login name
pub struct AccountStore {
    users: DashMap<String, UserRecord>,
    next_id: AtomicU64,
    /// Backing file; `None` keeps everything in memory
    path: Option<PathBuf>,
    /// Serializes registrations so duplicate checks and the file stay consistent
    write_lock: Mutex<()>,
}

impl AccountStore {
    /// Opens the store at `path`, loading existing users
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AccountError> {
        let path = path.into();
        let store = Self::from_records(load_users(&path)?, Some(path));
        tracing::info!("Account store opened with {} users", store.users.len());
        Ok(store)
    }

    /// A store that is never written to disk
    pub fn in_memory() -> Self {
        Self::from_records(Vec::new(), None)
    }

    fn from_records(records: Vec<UserRecord>, path: Option<PathBuf>) -> Self {
        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let users = records
            .into_iter()
            .map(|record| (record.user_id.clone(), record))
            .collect();
        Self {
            users,
            next_id: AtomicU64::new(next_id),
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Creates an account after checking required fields and uniqueness
    pub fn register(&self, new_user: NewUser) -> Result<PublicUser, AccountError> {
        new_user.validate()?;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if self.user_id_exists(&new_user.user_id) {
            return Err(AccountError::DuplicateUserId);
        }
        if self.email_exists(&new_user.email) {
            return Err(AccountError::DuplicateEmail);
        }

        let record = UserRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            user_id: new_user.user_id,
            password_hash: password::hash_password(&new_user.password),
            name: new_user.name,
            job: new_user.job,
            email: new_user.email,
            created_at: Utc::now(),
        };
        let public = PublicUser::from(&record);
        let key = record.user_id.clone();
        self.users.insert(key.clone(), record);

        if let Err(e) = self.persist() {
            self.users.remove(&key);
            tracing::error!("Failed to save user {}: {}", key, e);
            return Err(e);
        }

        tracing::info!("Registered user {}", key);
        Ok(public)
    }

    /// Checks credentials and returns the user on success
    pub fn authenticate(&self, user_id: &str, password: &str) -> Result<PublicUser, AccountError> {
        let record = self
            .users
            .get(user_id)
            .ok_or(AccountError::InvalidCredentials)?;
        if !password::verify_password(password, &record.password_hash) {
            return Err(AccountError::InvalidCredentials);
        }
        Ok(PublicUser::from(record.value()))
    }

    /// Looks a user up by internal id
    pub fn get(&self, id: u64) -> Option<PublicUser> {
        self.users
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| PublicUser::from(entry.value()))
    }

    pub fn user_id_exists(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn email_exists(&self, email: &str) -> bool {
        self.users.iter().any(|entry| entry.email == email)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn persist(&self) -> Result<(), AccountError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut records: Vec<UserRecord> =
            self.users.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        save_users(path, &records)?;
        Ok(())
    }
}
