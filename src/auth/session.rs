//! Session lifecycle: issue, resolve, expire and revoke login sessions.
//!
//! The `sessions` table is authoritative. `SessionManager` keeps an in-memory
//! mirror keyed by token that is refreshed on every successful resolution and
//! dropped whenever the table disagrees with it.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension, TransactionBehavior};

use crate::db::models::{Role, Session, DB_TIME_FORMAT};
use crate::db::StoreResult;
use crate::state::DbPool;

/// Who a session token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: i64,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSession {
    pub identity: SessionIdentity,
    pub expires_at: NaiveDateTime,
}

#[derive(Clone)]
pub struct SessionManager {
    pool: DbPool,
    lifetime: Duration,
    mirror: Arc<RwLock<HashMap<String, CachedSession>>>,
}

impl SessionManager {
    pub fn new(pool: DbPool, lifetime: Duration) -> Self {
        Self {
            pool,
            lifetime,
            mirror: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a new token for `user_id`, revoking every session it already had.
    pub fn create(&self, user_id: i64, role: Role) -> StoreResult<String> {
        let token = generate_token();
        let expires_at = Utc::now().naive_utc() + self.lifetime;

        {
            let mut conn = self.pool.get()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
            tx.execute(
                "INSERT INTO sessions (token, user_id, role, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    token,
                    user_id,
                    role,
                    expires_at.format(DB_TIME_FORMAT).to_string()
                ],
            )?;
            tx.commit()?;
        }

        let mut mirror = self.write_mirror();
        mirror.retain(|_, cached| cached.identity.user_id != user_id);
        mirror.insert(
            token.clone(),
            CachedSession {
                identity: SessionIdentity { user_id, role },
                expires_at,
            },
        );

        tracing::info!("Session created for user {}", user_id);
        Ok(token)
    }

    /// Resolve a token to its owner. Missing, expired and unreadable sessions
    /// all come back as `None`; storage errors are logged, never returned.
    pub fn resolve(&self, token: &str) -> Option<SessionIdentity> {
        let session = match self.load(token) {
            Ok(Some(session)) => session,
            Ok(None) => {
                self.forget(token);
                return None;
            }
            Err(e) => {
                tracing::error!("Session lookup failed: {}", e);
                return None;
            }
        };

        let expires_at = match NaiveDateTime::parse_from_str(&session.expires_at, DB_TIME_FORMAT)
        {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!("Unreadable session expiry {:?}: {}", session.expires_at, e);
                if let Err(e) = self.delete_row(token) {
                    tracing::warn!("Failed to delete unreadable session: {}", e);
                }
                self.forget(token);
                return None;
            }
        };

        if expires_at <= Utc::now().naive_utc() {
            if let Err(e) = self.delete_row(token) {
                tracing::warn!("Failed to delete expired session: {}", e);
            }
            self.forget(token);
            return None;
        }

        let identity = SessionIdentity {
            user_id: session.user_id,
            role: session.role,
        };
        self.write_mirror().insert(
            token.to_string(),
            CachedSession {
                identity,
                expires_at,
            },
        );
        Some(identity)
    }

    /// Log out. The mirror entry always goes; a failed row delete is only logged.
    pub fn end(&self, token: &str) {
        if let Err(e) = self.delete_row(token) {
            tracing::warn!("Failed to delete session on logout: {}", e);
        }
        self.forget(token);
    }

    /// Remove the session only if it is past its expiry. Returns whether a row went away.
    pub fn delete_if_expired(&self, token: &str) -> StoreResult<bool> {
        let now = Utc::now().naive_utc().format(DB_TIME_FORMAT).to_string();
        let conn = self.pool.get()?;
        let removed = conn.execute(
            "DELETE FROM sessions WHERE token = ?1 AND expires_at <= ?2",
            params![token, now],
        )?;
        drop(conn);

        if removed > 0 {
            self.forget(token);
        }
        Ok(removed > 0)
    }

    /// The mirror's view of a token, without touching storage.
    pub fn cached(&self, token: &str) -> Option<CachedSession> {
        self.read_mirror().get(token).cloned()
    }

    fn load(&self, token: &str) -> StoreResult<Option<Session>> {
        let conn = self.pool.get()?;
        let session = conn
            .query_row(
                "SELECT token, user_id, role, expires_at FROM sessions WHERE token = ?1",
                params![token],
                |row| {
                    Ok(Session {
                        token: row.get(0)?,
                        user_id: row.get(1)?,
                        role: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    fn delete_row(&self, token: &str) -> StoreResult<()> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }

    fn forget(&self, token: &str) {
        self.write_mirror().remove(token);
    }

    // The mirror is rebuilt from storage on demand, so a poisoned lock is still usable.
    fn read_mirror(&self) -> RwLockReadGuard<'_, HashMap<String, CachedSession>> {
        self.mirror.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_mirror(&self) -> RwLockWriteGuard<'_, HashMap<String, CachedSession>> {
        self.mirror.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn manager() -> (SessionManager, i64, i64) {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let bob = testing::insert_user(&pool, "bob", Role::Admin);
        (SessionManager::new(pool, Duration::hours(24)), alice, bob)
    }

    fn row_count(sessions: &SessionManager, token: &str) -> i64 {
        let conn = sessions.pool.get().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE token = ?1",
            params![token],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn create_then_resolve() {
        let (sessions, alice, _) = manager();
        let token = sessions.create(alice, Role::User).unwrap();

        let identity = sessions.resolve(&token).unwrap();
        assert_eq!(identity.user_id, alice);
        assert_eq!(identity.role, Role::User);
        assert_eq!(sessions.cached(&token).unwrap().identity, identity);
    }

    #[test]
    fn unknown_token_is_unauthenticated() {
        let (sessions, _, _) = manager();
        assert!(sessions.resolve("not-a-token").is_none());
    }

    #[test]
    fn new_session_revokes_previous_tokens() {
        let (sessions, alice, bob) = manager();
        let first = sessions.create(alice, Role::User).unwrap();
        let bobs = sessions.create(bob, Role::Admin).unwrap();
        let second = sessions.create(alice, Role::User).unwrap();

        assert!(sessions.resolve(&first).is_none());
        assert!(sessions.cached(&first).is_none());
        assert_eq!(row_count(&sessions, &first), 0);
        assert_eq!(sessions.resolve(&second).unwrap().user_id, alice);
        assert_eq!(sessions.resolve(&bobs).unwrap().role, Role::Admin);
    }

    #[test]
    fn expired_session_is_removed_on_resolve() {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let sessions = SessionManager::new(pool, Duration::seconds(-5));
        let token = sessions.create(alice, Role::User).unwrap();
        assert_eq!(row_count(&sessions, &token), 1);

        assert!(sessions.resolve(&token).is_none());
        assert_eq!(row_count(&sessions, &token), 0);
        assert!(sessions.cached(&token).is_none());
        assert!(sessions.resolve(&token).is_none());
    }

    #[test]
    fn unreadable_expiry_is_removed_on_resolve() {
        let (sessions, alice, _) = manager();
        let token = sessions.create(alice, Role::User).unwrap();
        {
            let conn = sessions.pool.get().unwrap();
            conn.execute("UPDATE sessions SET expires_at = 'garbage'", [])
                .unwrap();
        }
        assert!(sessions.cached(&token).is_some());

        assert!(sessions.resolve(&token).is_none());
        assert!(sessions.cached(&token).is_none());
        assert_eq!(row_count(&sessions, &token), 0);
    }

    #[test]
    fn concurrent_logins_leave_one_live_session() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = testing::file_pool(tmp.path());
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let sessions = SessionManager::new(pool, Duration::hours(24));

        let tokens: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| sessions.create(alice, Role::User).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let live: Vec<&String> = tokens
            .iter()
            .filter(|token| sessions.resolve(token).is_some())
            .collect();
        assert_eq!(live.len(), 1);
        assert_eq!(
            testing::count(
                &sessions.pool,
                "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
                alice
            ),
            1
        );
        assert_eq!(row_count(&sessions, live[0]), 1);
    }

    #[test]
    fn end_removes_row_and_mirror_entry() {
        let (sessions, alice, _) = manager();
        let token = sessions.create(alice, Role::User).unwrap();
        sessions.end(&token);

        assert_eq!(row_count(&sessions, &token), 0);
        assert!(sessions.cached(&token).is_none());
        assert!(sessions.resolve(&token).is_none());
        // Ending twice is harmless.
        sessions.end(&token);
    }

    #[test]
    fn cold_mirror_heals_on_resolve() {
        let (sessions, alice, _) = manager();
        let token = sessions.create(alice, Role::User).unwrap();

        // Same storage, fresh process-wide state.
        let restarted = SessionManager::new(sessions.pool.clone(), Duration::hours(24));
        assert!(restarted.cached(&token).is_none());
        assert_eq!(restarted.resolve(&token).unwrap().user_id, alice);
        assert!(restarted.cached(&token).is_some());
    }

    #[test]
    fn storage_wins_over_stale_mirror() {
        let (sessions, alice, _) = manager();
        let token = sessions.create(alice, Role::User).unwrap();
        {
            let conn = sessions.pool.get().unwrap();
            conn.execute("DELETE FROM sessions", []).unwrap();
        }
        assert!(sessions.cached(&token).is_some());
        assert!(sessions.resolve(&token).is_none());
        assert!(sessions.cached(&token).is_none());
    }

    #[test]
    fn storage_failure_degrades_to_unauthenticated() {
        let (sessions, alice, _) = manager();
        let token = sessions.create(alice, Role::User).unwrap();
        {
            let conn = sessions.pool.get().unwrap();
            conn.execute_batch("PRAGMA foreign_keys = OFF; DROP TABLE sessions;")
                .unwrap();
        }
        assert!(sessions.resolve(&token).is_none());
        // Logout still clears local state.
        sessions.end(&token);
        assert!(sessions.cached(&token).is_none());
    }

    #[test]
    fn delete_if_expired_leaves_live_sessions() {
        let (sessions, alice, _) = manager();
        let token = sessions.create(alice, Role::User).unwrap();
        assert!(!sessions.delete_if_expired(&token).unwrap());
        assert_eq!(row_count(&sessions, &token), 1);
    }

    #[test]
    fn delete_if_expired_removes_stale_sessions() {
        let pool = testing::pool();
        let alice = testing::insert_user(&pool, "alice", Role::User);
        let sessions = SessionManager::new(pool, Duration::seconds(-5));
        let token = sessions.create(alice, Role::User).unwrap();

        assert!(sessions.delete_if_expired(&token).unwrap());
        assert_eq!(row_count(&sessions, &token), 0);
        assert!(sessions.cached(&token).is_none());
    }
}
