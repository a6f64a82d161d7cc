use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::session::{Role, Session};

/// The size of a session token in bytes before hex encoding.
const TOKEN_SIZE: usize = 16;

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Generates a new random session token.
///
/// # Returns
///
/// 128 bits from the OS RNG, hex encoded.
fn generate_token() -> String {
    let mut token = [0u8; TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);
    hex::encode(token)
}

/// In-memory table of active sessions keyed by opaque token.
///
/// Every operation holds the store-wide lock for its whole body. A session
/// stays valid while it keeps being validated; only idle sessions expire.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    inactivity_window: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Creates a store on the wall clock.
    pub fn new(inactivity_window: TimeDelta) -> Self {
        Self::with_clock(inactivity_window, Arc::new(SystemClock))
    }

    pub fn with_clock(inactivity_window: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            inactivity_window,
            clock,
        }
    }

    pub fn inactivity_window(&self) -> TimeDelta {
        self.inactivity_window
    }

    /// Starts a session and returns its token.
    ///
    /// A token collision overwrites the older session.
    pub fn issue(&self, user_id: i64, role: Role, display_name: impl Into<String>) -> String {
        let token = generate_token();
        let session = Session::new(user_id, role, display_name.into(), self.clock.now());

        let mut sessions = self.sessions.lock();
        sessions.insert(token.clone(), session);
        tracing::debug!("🔑 Session issued for {} {}", role, user_id);
        token
    }

    /// Looks up a session and refreshes its last activity.
    ///
    /// An expired session is removed and reported as `ExpiredToken`; later
    /// lookups of the same token see `InvalidToken`.
    pub fn validate(&self, token: &str) -> Result<Session> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();

        let session = sessions.get_mut(token).ok_or(AppError::InvalidToken)?;

        if session.is_expired(now, self.inactivity_window) {
            tracing::debug!("Session expired for user {}", session.user_id);
            sessions.remove(token);
            return Err(AppError::ExpiredToken);
        }

        session.last_activity = now;
        Ok(session.clone())
    }

    /// Ends a session. No-op for unknown tokens.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions.lock().remove(token);
        if let Some(session) = &removed {
            tracing::debug!("Session revoked for user {}", session.user_id);
        }
        removed.is_some()
    }

    /// Ends every session of one user and returns how many were ended.
    pub fn revoke_user(&self, user_id: i64) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        before - sessions.len()
    }

    /// Removes every expired session and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.inactivity_window));
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!("🧹 Swept {} expired sessions", removed);
        }
        removed
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Drops every session. Used at shutdown.
    pub fn clear(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let count = sessions.len();
        sessions.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = SessionStore::with_clock(TimeDelta::hours(24), clock.clone());
        (store, clock)
    }

    #[test]
    fn issue_then_validate_returns_subject() {
        let (store, _) = store();
        let token = store.issue(42, Role::Patient, "Zhang San");

        let session = store.validate(&token).unwrap();
        assert_eq!(session.user_id, 42);
        assert_eq!(session.role, Role::Patient);
        assert_eq!(session.display_name, "Zhang San");
    }

    #[test]
    fn tokens_are_128_bit_hex() {
        let (store, _) = store();
        let token = store.issue(1, Role::Doctor, "Dr. Wang");
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, store.issue(1, Role::Doctor, "Dr. Wang"));
    }

    #[test]
    fn unknown_token_is_invalid() {
        let (store, _) = store();
        assert!(matches!(store.validate("nope"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn idle_session_expires_then_disappears() {
        let (store, clock) = store();
        let token = store.issue(7, Role::Patient, "p");

        clock.advance(TimeDelta::hours(24) + TimeDelta::seconds(1));

        assert!(matches!(store.validate(&token), Err(AppError::ExpiredToken)));
        assert!(matches!(store.validate(&token), Err(AppError::InvalidToken)));
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let (store, clock) = store();
        let token = store.issue(7, Role::Patient, "p");

        clock.advance(TimeDelta::hours(24));
        assert!(matches!(store.validate(&token), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn activity_extends_lifetime_indefinitely() {
        let (store, clock) = store();
        let token = store.issue(9, Role::Doctor, "d");

        for _ in 0..30 {
            clock.advance(TimeDelta::hours(23));
            let session = store.validate(&token).unwrap();
            assert_eq!(session.last_activity, clock.now());
        }

        let session = store.validate(&token).unwrap();
        assert!(clock.now() - session.created_at > TimeDelta::days(28));
    }

    #[test]
    fn revoke_is_idempotent() {
        let (store, _) = store();
        let token = store.issue(3, Role::Patient, "p");

        assert!(store.revoke(&token));
        assert!(!store.revoke(&token));
        assert!(matches!(store.validate(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn sweep_removes_only_idle_sessions() {
        let (store, clock) = store();
        let idle = store.issue(1, Role::Patient, "idle");
        clock.advance(TimeDelta::hours(12));
        let active = store.issue(2, Role::Patient, "active");
        clock.advance(TimeDelta::hours(13));

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.active_count(), 1);
        assert!(store.validate(&active).is_ok());
        assert!(matches!(store.validate(&idle), Err(AppError::InvalidToken)));
    }

    #[test]
    fn revoke_user_ends_only_that_users_sessions() {
        let (store, _) = store();
        let first = store.issue(5, Role::Patient, "p");
        let second = store.issue(5, Role::Patient, "p");
        let other = store.issue(6, Role::Patient, "q");

        assert_eq!(store.revoke_user(5), 2);
        assert!(matches!(store.validate(&first), Err(AppError::InvalidToken)));
        assert!(matches!(store.validate(&second), Err(AppError::InvalidToken)));
        assert!(store.validate(&other).is_ok());
        assert_eq!(store.revoke_user(5), 0);
    }

    #[test]
    fn concurrent_issue_and_validate() {
        let store = Arc::new(SessionStore::new(TimeDelta::hours(24)));
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let token = store.issue(i, Role::Patient, "p");
                        assert_eq!(store.validate(&token).unwrap().user_id, i);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(store.active_count(), 800);
    }
}
