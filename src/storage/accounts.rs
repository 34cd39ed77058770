//! Account storage
//!
//! User records are kept in a single `users.json` file in the data directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{get_data_dir, read_json, write_json_atomic, StorageError};

/// A registered user as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Internal numeric id
    pub id: u64,
    /// Login name chosen by the user
    pub user_id: String,
    /// Encoded salted hash, see [`crate::accounts::password`]
    pub password_hash: String,
    pub name: String,
    pub job: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Default location of the user file
pub fn users_path() -> Result<PathBuf, StorageError> {
    Ok(get_data_dir()?.join("users.json"))
}

/// Loads every user record, empty when the file does not exist yet
pub fn load_users(path: &Path) -> Result<Vec<UserRecord>, StorageError> {
    let users = read_json::<Vec<UserRecord>>(path)?.unwrap_or_default();
    tracing::debug!("Loaded {} user records from {:?}", users.len(), path);
    Ok(users)
}

/// Replaces the user file with `users`
pub fn save_users(path: &Path, users: &[UserRecord]) -> Result<(), StorageError> {
    write_json_atomic(path, &users)?;
    tracing::debug!("Saved {} user records", users.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, user_id: &str) -> UserRecord {
        UserRecord {
            id,
            user_id: user_id.to_string(),
            password_hash: "sha256$1$00$00".to_string(),
            name: "Kim".to_string(),
            job: "researcher".to_string(),
            email: format!("{user_id}@example.com"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_users(&dir.path().join("users.json")).unwrap().is_empty());
    }

    #[test]
    fn test_users_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let users = vec![record(1, "kim"), record(2, "lee")];

        save_users(&path, &users).unwrap();
        assert_eq!(load_users(&path).unwrap(), users);
    }
}
