//! Login sessions
//!
//! Opaque random tokens mapped to a user, expiring after a fixed lifetime.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "medresearch_session";

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Internal id of the logged-in user
    pub user_pk: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-memory session table
pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Lifetime of new sessions
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Opens a session for `user_pk` and returns its token
    pub fn create(&self, user_pk: u64) -> Uuid {
        let token = Uuid::new_v4();
        let created_at = Utc::now();
        self.sessions.insert(
            token,
            Session {
                user_pk,
                created_at,
                expires_at: created_at + self.ttl,
            },
        );
        tracing::debug!("Session opened for user {}", user_pk);
        token
    }

    /// Looks up a live session; expired ones are dropped on sight
    pub fn get(&self, token: &Uuid) -> Option<Session> {
        let session = self.sessions.get(token).map(|entry| entry.value().clone())?;
        if session.is_expired(Utc::now()) {
            self.sessions.remove(token);
            return None;
        }
        Some(session)
    }

    /// Ends a session; unknown tokens are ignored
    pub fn remove(&self, token: &Uuid) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drops every expired session and returns how many went
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut purged = 0;
        // Counted inside `retain` since logins may insert concurrently
        self.sessions.retain(|_, session| {
            let keep = !session.is_expired(now);
            if !keep {
                purged += 1;
            }
            keep
        });
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let store = SessionStore::new(Duration::hours(24));
        let token = store.create(7);

        let session = store.get(&token).unwrap();
        assert_eq!(session.user_pk, 7);
        assert_eq!(session.expires_at - session.created_at, Duration::hours(24));
        assert!(store.get(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        let store = SessionStore::new(Duration::hours(1));
        assert_ne!(store.create(1), store.create(1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove() {
        let store = SessionStore::new(Duration::hours(1));
        let token = store.create(1);

        assert!(store.remove(&token));
        assert!(!store.remove(&token));
        assert!(store.get(&token).is_none());
    }

    #[test]
    fn test_expired_sessions_are_dropped() {
        let store = SessionStore::new(Duration::zero());
        let token = store.create(1);

        assert!(store.get(&token).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let expired = SessionStore::new(Duration::seconds(-1));
        expired.create(1);
        expired.create(2);
        assert_eq!(expired.purge_expired(), 2);
        assert!(expired.is_empty());

        let live = SessionStore::new(Duration::hours(1));
        assert_eq!(live.purge_expired(), 0);
        live.create(1);
        assert_eq!(live.purge_expired(), 0);
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn test_purge_while_logins_race() {
        let store = std::sync::Arc::new(SessionStore::new(Duration::hours(1)));
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for user in 0..2000 {
                    store.create(user);
                }
            })
        };

        let mut purged = 0;
        while !writer.is_finished() {
            purged += store.purge_expired();
        }
        writer.join().unwrap();

        assert_eq!(purged, 0);
        assert_eq!(store.len(), 2000);
    }
}
