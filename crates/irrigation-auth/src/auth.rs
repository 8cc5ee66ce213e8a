use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use irrigation_types::error::ControllerError;
use irrigation_types::session::{Role, Session, SESSION_TOKEN_LEN};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{info, warn};

use crate::clock::now_us;
use crate::rate_limiter::RateLimiter;
use crate::users::UserTable;

pub struct AuthSettings {
    pub max_concurrent_sessions: usize,
    pub session_timeout_us: u64,
    pub max_login_attempts: u32,
    pub rate_limit_window_us: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 5,
            session_timeout_us: 30 * 60 * 1_000_000,
            max_login_attempts: 5,
            rate_limit_window_us: 5 * 60 * 1_000_000,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AuthStats {
    pub total_logins: u64,
    pub total_failed_logins: u64,
    pub total_rate_limited: u64,
    pub total_logouts: u64,
}

/// C12: session table, role checks, rate limiting, and token validation.
pub struct AuthCore {
    users: UserTable,
    sessions: Mutex<HashMap<String, Session>>,
    rate_limiter: RateLimiter,
    settings: AuthSettings,
    total_logins: AtomicU64,
    total_failed_logins: AtomicU64,
    total_rate_limited: AtomicU64,
    total_logouts: AtomicU64,
}

impl AuthCore {
    pub fn new(users: UserTable, settings: AuthSettings) -> Self {
        let rate_limiter = RateLimiter::new(settings.rate_limit_window_us, settings.max_login_attempts);
        Self {
            users,
            sessions: Mutex::new(HashMap::new()),
            rate_limiter,
            settings,
            total_logins: AtomicU64::new(0),
            total_failed_logins: AtomicU64::new(0),
            total_rate_limited: AtomicU64::new(0),
            total_logouts: AtomicU64::new(0),
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session, ControllerError> {
        let now = now_us();

        if self.rate_limiter.is_limited(username, now) {
            self.total_rate_limited.fetch_add(1, Ordering::Relaxed);
            warn!(username, "login rejected: rate limited");
            return Err(ControllerError::RateLimited);
        }

        let user = match self.users.check_credentials(username, password) {
            Some(user) => user,
            None => {
                self.rate_limiter.record_failure(username, now);
                self.total_failed_logins.fetch_add(1, Ordering::Relaxed);
                return Err(ControllerError::InvalidCredentials);
            }
        };

        let mut sessions = self.sessions.lock().unwrap();
        if sessions.len() >= self.settings.max_concurrent_sessions {
            if self.settings.max_concurrent_sessions == 0 {
                return Err(ControllerError::MaxSessions);
            }
            let lru_token = sessions
                .values()
                .min_by_key(|s| s.last_activity_us)
                .map(|s| s.token.clone());
            match lru_token {
                Some(token) => {
                    sessions.remove(&token);
                }
                None => return Err(ControllerError::MaxSessions),
            }
        }

        let token = generate_token();
        let session = Session::new(token.clone(), user.username.clone(), user.role, now);
        sessions.insert(token, session.clone());
        drop(sessions);

        self.rate_limiter.record_success(username);
        self.total_logins.fetch_add(1, Ordering::Relaxed);
        self.sweep_expired_locked(now);
        info!(username, role = ?session.role, "login succeeded");
        Ok(session)
    }

    pub fn validate(&self, token: &str) -> Result<Session, ControllerError> {
        let now = now_us();
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(token)
            .ok_or_else(|| ControllerError::NotFound("session".to_string()))?;

        if !session.active {
            return Err(ControllerError::SessionExpired);
        }

        if now.saturating_sub(session.last_activity_us) > self.settings.session_timeout_us {
            session.active = false;
            return Err(ControllerError::SessionExpired);
        }

        session.last_activity_us = now;
        session.request_count += 1;
        Ok(session.clone())
    }

    pub fn require_role(&self, token: &str, min_role: Role) -> Result<Session, ControllerError> {
        let session = self.validate(token)?;
        if session.role < min_role {
            return Err(ControllerError::InvalidRole);
        }
        Ok(session)
    }

    pub fn logout(&self, token: &str) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(token) {
            session.active = false;
            self.total_logouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Sweeps the session table and returns the number of sessions removed.
    pub fn cleanup_expired(&self) -> u32 {
        let now = now_us();
        let mut sessions = self.sessions.lock().unwrap();
        self.sweep_expired_locked_guard(&mut sessions, now)
    }

    fn sweep_expired_locked(&self, now: u64) {
        let mut sessions = self.sessions.lock().unwrap();
        self.sweep_expired_locked_guard(&mut sessions, now);
    }

    fn sweep_expired_locked_guard(
        &self,
        sessions: &mut HashMap<String, Session>,
        now: u64,
    ) -> u32 {
        let timeout = self.settings.session_timeout_us;
        let before = sessions.len();
        sessions.retain(|_, session| {
            session.active && now.saturating_sub(session.last_activity_us) <= timeout
        });
        (before - sessions.len()) as u32
    }

    pub fn stats(&self) -> AuthStats {
        AuthStats {
            total_logins: self.total_logins.load(Ordering::Relaxed),
            total_failed_logins: self.total_failed_logins.load(Ordering::Relaxed),
            total_rate_limited: self.total_rate_limited.load(Ordering::Relaxed),
            total_logouts: self.total_logouts.load(Ordering::Relaxed),
        }
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.lock().unwrap().values().filter(|s| s.active).count()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::UserRecord;

    fn core() -> AuthCore {
        let users = UserTable::new(vec![UserRecord::new("owner", "secret", Role::Owner)]);
        AuthCore::new(users, AuthSettings::default())
    }

    #[test]
    fn login_then_logout_invalidates_token() {
        let core = core();
        let session = core.login("owner", "secret").unwrap();
        core.logout(&session.token);
        assert_eq!(core.validate(&session.token), Err(ControllerError::SessionExpired));
    }

    #[test]
    fn invalid_credentials_rejected() {
        let core = core();
        assert_eq!(
            core.login("owner", "wrong"),
            Err(ControllerError::InvalidCredentials)
        );
    }

    #[test]
    fn require_role_enforces_hierarchy() {
        let core = core();
        let session = core.login("owner", "secret").unwrap();
        assert!(core.require_role(&session.token, Role::Manager).is_ok());

        let users = UserTable::new(vec![UserRecord::new("viewer", "pw", Role::Viewer)]);
        let core2 = AuthCore::new(users, AuthSettings::default());
        let viewer_session = core2.login("viewer", "pw").unwrap();
        assert_eq!(
            core2.require_role(&viewer_session.token, Role::Manager),
            Err(ControllerError::InvalidRole)
        );
    }

    #[test]
    fn session_table_evicts_least_recently_active_when_full() {
        let users = UserTable::new(vec![UserRecord::new("u", "p", Role::Viewer)]);
        let mut settings = AuthSettings::default();
        settings.max_concurrent_sessions = 1;
        let core = AuthCore::new(users, settings);
        let first = core.login("u", "p").unwrap();
        let second = core.login("u", "p").unwrap();
        assert!(core.validate(&first.token).is_err());
        assert!(core.validate(&second.token).is_ok());
    }
}
