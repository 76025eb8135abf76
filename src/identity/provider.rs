use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::accounts::AccountDirectory;
use super::principal::Principal;
use super::session::{Session, SessionManager};
use super::IdentityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receives the authoritative session after every provider-side change.
pub type SessionListener = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

/// Contract of the external identity provider as consumed by the client.
pub trait IdentityProvider: Send + Sync {
    fn current_session(&self) -> BoxFuture<'_, Result<Option<Session>, IdentityError>>;
    fn on_session_change(&self, listener: SessionListener) -> ListenerId;
    fn remove_listener(&self, id: ListenerId) -> bool;
    fn sign_out(&self) -> BoxFuture<'_, Result<(), IdentityError>>;
}

/// Listener registry shared by provider implementations.
#[derive(Default)]
pub struct ListenerSet {
    next: AtomicU64,
    entries: RwLock<Vec<(ListenerId, SessionListener)>>,
}

impl ListenerSet {
    pub fn add(&self, listener: SessionListener) -> ListenerId {
        let id = ListenerId(self.next.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(lid, _)| *lid != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn notify(&self, event: AuthEvent, session: Option<&Session>) {
        // Snapshot first so a listener may unregister itself while being called.
        let listeners: Vec<SessionListener> = self.entries.read().iter().map(|(_, l)| l.clone()).collect();
        for l in listeners {
            l(event, session);
        }
    }
}

/// In-process identity provider for one viewer, backed by a shared account
/// directory and session table.
pub struct LocalIdentityProvider {
    directory: Arc<AccountDirectory>,
    sessions: Arc<SessionManager>,
    current: RwLock<Option<Session>>,
    listeners: ListenerSet,
}

impl LocalIdentityProvider {
    pub fn new(directory: Arc<AccountDirectory>, sessions: Arc<SessionManager>) -> Self {
        Self { directory, sessions, current: RwLock::new(None), listeners: ListenerSet::default() }
    }

    pub fn directory(&self) -> &Arc<AccountDirectory> { &self.directory }

    fn set_current(&self, event: AuthEvent, session: Option<Session>) {
        *self.current.write() = session.clone();
        debug!(target: "folio::session", ?event, present = session.is_some(), "provider.change");
        self.listeners.notify(event, session.as_ref());
    }

    /// Issue a session for `principal` and end the one it replaces.
    fn start_session(&self, principal: Principal) -> Result<Session, IdentityError> {
        let session = self.sessions.issue(principal)?;
        let previous = self.current.read().as_ref().map(|s| s.access_token.clone());
        if let Some(token) = previous {
            self.sessions.logout(&token);
        }
        self.set_current(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    pub fn sign_up(&self, email: &str, password: &str, display_name: Option<String>) -> Result<Session, IdentityError> {
        let principal = self.directory.sign_up(email, password, display_name)?;
        self.start_session(principal)
    }

    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let principal = self.directory.verify(email, password)?;
        info!(target: "folio::session", user = %principal.user_id, "provider.sign_in");
        self.start_session(principal)
    }

    /// Silent token refresh: replaces the current session with a new token.
    pub fn refresh_session(&self) -> Result<Session, IdentityError> {
        let token = self.current.read().as_ref().map(|s| s.access_token.clone()).ok_or(IdentityError::NoSession)?;
        match self.sessions.refresh(&token) {
            Ok(session) => {
                self.set_current(AuthEvent::TokenRefreshed, Some(session.clone()));
                Ok(session)
            }
            Err(IdentityError::NoSession) => {
                self.set_current(AuthEvent::SignedOut, None);
                Err(IdentityError::NoSession)
            }
            Err(e) => Err(e),
        }
    }

    /// Start password recovery. Returns the link that would be emailed, or `None`
    /// when no account matches.
    pub fn reset_password_for_email(&self, email: &str, redirect_path: &str, param: &str) -> Result<Option<String>, IdentityError> {
        let Some(token) = self.directory.issue_recovery(email)? else { return Ok(None); };
        let current = self.current.read().clone();
        self.listeners.notify(AuthEvent::PasswordRecovery, current.as_ref());
        Ok(Some(format!("{}?{}={}", redirect_path, param, urlencoding::encode(&token))))
    }

    /// Redeem a recovery token. Every session of that user is revoked; when the
    /// viewer's own session was among them the viewer is signed out.
    pub fn update_password(&self, recovery_token: &str, new_password: &str) -> Result<(), IdentityError> {
        let principal = self.directory.redeem_recovery(recovery_token, new_password)?;
        let revoked = self.sessions.revoke_user(&principal.user_id);
        let current = self.current.read().clone();
        match current {
            Some(s) if revoked.contains(&s.access_token) => self.set_current(AuthEvent::SignedOut, None),
            other => self.listeners.notify(AuthEvent::UserUpdated, other.as_ref()),
        }
        Ok(())
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn current_session(&self) -> BoxFuture<'_, Result<Option<Session>, IdentityError>> {
        async move {
            let current = self.current.read().clone();
            match current {
                Some(s) => match self.sessions.validate(&s.access_token) {
                    Some(live) => Ok(Some(live)),
                    None => {
                        *self.current.write() = None;
                        Ok(None)
                    }
                },
                None => Ok(None),
            }
        }
        .boxed()
    }

    fn on_session_change(&self, listener: SessionListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), IdentityError>> {
        async move {
            let old = self.current.read().clone();
            if let Some(s) = old {
                self.sessions.logout(&s.access_token);
                info!(target: "folio::session", user = %s.user_id(), "provider.sign_out");
            }
            self.set_current(AuthEvent::SignedOut, None);
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new(Arc::new(AccountDirectory::new()), Arc::new(SessionManager::default()))
    }

    #[tokio::test]
    async fn listeners_receive_full_session_values() {
        let p = provider();
        let seen: Arc<Mutex<Vec<(AuthEvent, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let id = p.on_session_change(Arc::new(move |ev, s| seen2.lock().push((ev, s.is_some()))));

        p.sign_up("a@b.c", "secret1", None).unwrap();
        p.refresh_session().unwrap();
        p.sign_out().await.unwrap();
        assert!(p.remove_listener(id));
        p.sign_in_with_password("a@b.c", "secret1").unwrap();

        assert_eq!(
            *seen.lock(),
            vec![(AuthEvent::SignedIn, true), (AuthEvent::TokenRefreshed, true), (AuthEvent::SignedOut, false)]
        );
    }

    #[tokio::test]
    async fn current_session_tracks_sign_in_and_out() {
        let p = provider();
        assert!(p.current_session().await.unwrap().is_none());
        let s = p.sign_up("a@b.c", "secret1", None).unwrap();
        assert_eq!(p.current_session().await.unwrap().map(|x| x.access_token), Some(s.access_token));
        p.sign_out().await.unwrap();
        assert!(p.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recovery_link_carries_token() {
        let p = provider();
        p.sign_up("a@b.c", "secret1", None).unwrap();
        p.sign_out().await.unwrap();
        let link = p.reset_password_for_email("a@b.c", "/update-password", "access_token").unwrap().unwrap();
        let token = link.strip_prefix("/update-password?access_token=").unwrap();
        let token = urlencoding::decode(token).unwrap().into_owned();
        p.update_password(&token, "brandnew").unwrap();
        assert!(p.sign_in_with_password("a@b.c", "brandnew").is_ok());
        assert!(p.reset_password_for_email("nobody@b.c", "/update-password", "access_token").unwrap().is_none());
    }

    #[tokio::test]
    async fn signing_up_again_ends_the_previous_session() {
        let sessions = Arc::new(SessionManager::default());
        let p = LocalIdentityProvider::new(Arc::new(AccountDirectory::new()), sessions.clone());
        let first = p.sign_up("a@b.c", "secret1", None).unwrap();
        let second = p.sign_up("d@e.f", "secret1", None).unwrap();
        assert!(sessions.validate(&first.access_token).is_none());
        assert!(sessions.validate(&second.access_token).is_some());
        assert_eq!(sessions.active_count(), 1);
    }

    #[tokio::test]
    async fn password_update_signs_out_the_revoked_viewer() {
        let p = provider();
        p.sign_up("a@b.c", "secret1", None).unwrap();
        let seen: Arc<Mutex<Vec<(AuthEvent, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        p.on_session_change(Arc::new(move |ev, s| seen2.lock().push((ev, s.is_some()))));

        let link = p.reset_password_for_email("a@b.c", "/update-password", "access_token").unwrap().unwrap();
        let token = urlencoding::decode(link.trim_start_matches("/update-password?access_token=")).unwrap().into_owned();
        p.update_password(&token, "brandnew").unwrap();

        assert!(p.current_session().await.unwrap().is_none());
        assert_eq!(seen.lock().last(), Some(&(AuthEvent::SignedOut, false)));
    }

    #[tokio::test]
    async fn password_update_for_another_user_keeps_the_viewer() {
        let p = provider();
        p.directory().sign_up("other@b.c", "secret1", None).unwrap();
        let me = p.sign_up("a@b.c", "secret1", None).unwrap();
        let link = p.reset_password_for_email("other@b.c", "/update-password", "access_token").unwrap().unwrap();
        let token = urlencoding::decode(link.trim_start_matches("/update-password?access_token=")).unwrap().into_owned();
        p.update_password(&token, "brandnew").unwrap();
        assert_eq!(p.current_session().await.unwrap().map(|s| s.access_token), Some(me.access_token));
    }
}
