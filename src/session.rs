//! Admin session state.
//!
//! A [`SessionContext`] is handed to whatever issues authenticated calls.
//! Expiry is checked explicitly on every read; a response of 401 from the API
//! signs the session out.

use log::{debug, info};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime};

/// A bearer token issued by the studio API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    expires_at: Option<SystemTime>,
}

impl Session {
    /// A token with no known expiry.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn with_ttl(token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: SystemTime::now().checked_add(ttl),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        !self.token.is_empty() && self.expires_at.map_or(true, |expiry| now < expiry)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, session: Session) {
        info!("Admin session started");
        *self.write() = Some(session);
    }

    pub fn sign_out(&self) {
        if self.write().take().is_some() {
            info!("Admin session ended");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.bearer_token().is_some()
    }

    /// Token of the current session, clearing it first if it has expired.
    pub fn bearer_token(&self) -> Option<String> {
        let now = SystemTime::now();
        {
            let guard = self.read();
            match guard.as_ref() {
                None => return None,
                Some(session) if session.is_valid_at(now) => return Some(session.token.clone()),
                Some(_) => {}
            }
        }
        self.clear_expired(now);
        None
    }

    /// Clears the stored session only if it is still invalid at `now`;
    /// a session signed in after the read check survives.
    fn clear_expired(&self, now: SystemTime) -> bool {
        let mut guard = self.write();
        match guard.as_ref() {
            Some(session) if !session.is_valid_at(now) => {
                *guard = None;
                debug!("Admin session expired");
                true
            }
            _ => false,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
