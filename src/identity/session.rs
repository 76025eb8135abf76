use std::collections::{HashMap, HashSet};
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::principal::Principal;
use super::IdentityError;

pub type SessionToken = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: SessionToken,
    pub principal: Principal,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn user_id(&self) -> &str { &self.principal.user_id }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }
}

/// What the client currently knows about the viewer's session.
///
/// `Unknown` means the initial provider fetch has not resolved yet. It must
/// never be read as `Absent`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unknown,
    Absent,
    Present(Session),
}

impl SessionState {
    pub fn from_option(session: Option<Session>) -> Self {
        match session {
            Some(s) => SessionState::Present(s),
            None => SessionState::Absent,
        }
    }

    /// Resolve expiry against `now`: a lapsed session reads as `Absent`.
    pub fn as_of(&self, now: DateTime<Utc>) -> SessionState {
        match self {
            SessionState::Present(s) if s.is_expired_at(now) => SessionState::Absent,
            other => other.clone(),
        }
    }

    pub fn is_unknown(&self) -> bool { matches!(self, SessionState::Unknown) }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Present(s) => Some(s),
            _ => None,
        }
    }
}

/// 256-bit random token, base64url without padding. Fails rather than hand out a
/// predictable token when the OS random source is unavailable.
pub(crate) fn gen_token() -> Result<String, IdentityError> {
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| {
        error!(target: "folio::session", error = %e, "random source unavailable; refusing to issue token");
        IdentityError::Internal(format!("random source unavailable: {e}"))
    })?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Random token for CSRF protection of state-changing requests.
pub fn new_csrf_token() -> Result<String, IdentityError> { gen_token() }

/// Token-keyed session table with a fixed time-to-live.
pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
    user_index: RwLock<HashMap<String, HashSet<SessionToken>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()), user_index: RwLock::new(HashMap::new()) }
    }

    fn ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::hours(1))
    }

    /// Issue a fresh session. Expired sessions are swept first so abandoned tokens
    /// do not accumulate.
    pub fn issue(&self, principal: Principal) -> Result<Session, IdentityError> {
        self.prune_expired();
        let now = Utc::now();
        let session = Session {
            access_token: gen_token()?,
            principal,
            issued_at: now,
            expires_at: now + self.ttl_chrono(),
        };
        self.sessions.write().insert(session.access_token.clone(), session.clone());
        self.user_index
            .write()
            .entry(session.principal.user_id.clone())
            .or_default()
            .insert(session.access_token.clone());
        debug!(target: "folio::session", user = %session.principal.user_id, ttl_secs = self.ttl.as_secs(), "session.issue");
        Ok(session)
    }

    /// Return the live session for `token`, pruning it if it has expired.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let now = Utc::now();
        let expired = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(s) if !s.is_expired_at(now) => return Some(s.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.logout(token);
        }
        None
    }

    /// Replace a live session with a freshly issued one for the same principal.
    pub fn refresh(&self, token: &str) -> Result<Session, IdentityError> {
        let current = self.validate(token).ok_or(IdentityError::NoSession)?;
        let next = self.issue(current.principal)?;
        self.logout(token);
        Ok(next)
    }

    /// Drop every expired session and return the removed tokens.
    pub fn prune_expired(&self) -> Vec<SessionToken> {
        let now = Utc::now();
        let expired: Vec<SessionToken> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, s)| s.is_expired_at(now))
            .map(|(t, _)| t.clone())
            .collect();
        for token in &expired {
            self.logout(token);
        }
        if !expired.is_empty() {
            debug!(target: "folio::session", count = expired.len(), "session.prune");
        }
        expired
    }

    /// Whether `token` is still tracked, live or not yet pruned.
    pub fn contains(&self, token: &str) -> bool { self.sessions.read().contains_key(token) }

    pub fn logout(&self, token: &str) -> bool {
        let Some(session) = self.sessions.write().remove(token) else { return false; };
        let mut idx = self.user_index.write();
        if let Some(set) = idx.get_mut(&session.principal.user_id) {
            set.remove(token);
            if set.is_empty() { idx.remove(&session.principal.user_id); }
        }
        true
    }

    /// End every session of `user_id`; returns the revoked tokens so callers can
    /// drop state keyed by them.
    pub fn revoke_user(&self, user_id: &str) -> Vec<SessionToken> {
        let tokens = self.user_index.write().remove(user_id).unwrap_or_default();
        let mut sessions = self.sessions.write();
        let revoked: Vec<SessionToken> = tokens.into_iter().filter(|t| sessions.remove(t).is_some()).collect();
        debug!(target: "folio::session", user = %user_id, count = revoked.len(), "session.revoke");
        revoked
    }

    pub fn active_count(&self) -> usize { self.sessions.read().len() }
}
