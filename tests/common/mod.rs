//! Shared test doubles for the session store and navigation shell tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use folio::identity::{AuthEvent, IdentityError, IdentityProvider, ListenerId, ListenerSet, Principal, Session, SessionListener};
use folio::routing::{Renderer, View};

pub type FetchResult = Result<Option<Session>, IdentityError>;

/// Identity provider whose initial fetch is answered by the test, and whose
/// change feed is driven by `push`.
#[derive(Default)]
pub struct ScriptedProvider {
    pub listeners: ListenerSet,
    fetch: Mutex<Option<oneshot::Receiver<FetchResult>>>,
    immediate: Mutex<Option<FetchResult>>,
}

impl ScriptedProvider {
    /// Provider answering the initial fetch right away.
    pub fn answering(result: FetchResult) -> Arc<Self> {
        let p = Self::default();
        *p.immediate.lock() = Some(result);
        Arc::new(p)
    }

    /// Provider whose initial fetch stays pending until the returned sender fires.
    pub fn gated() -> (Arc<Self>, oneshot::Sender<FetchResult>) {
        let (tx, rx) = oneshot::channel();
        let p = Self::default();
        *p.fetch.lock() = Some(rx);
        (Arc::new(p), tx)
    }

    pub fn push(&self, event: AuthEvent, session: Option<&Session>) {
        self.listeners.notify(event, session);
    }
}

impl IdentityProvider for ScriptedProvider {
    fn current_session(&self) -> BoxFuture<'_, FetchResult> {
        let immediate = self.immediate.lock().take();
        let gate = self.fetch.lock().take();
        async move {
            if let Some(result) = immediate {
                return result;
            }
            match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(IdentityError::Unavailable("fetch abandoned".into()))),
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
            self.listeners.notify(AuthEvent::SignedOut, None);
            Ok(())
        }
        .boxed()
    }
}

pub fn session_for(user: &str) -> Session {
    session_expiring(user, chrono::Duration::hours(1))
}

pub fn session_expiring(user: &str, ttl: chrono::Duration) -> Session {
    let now = Utc::now();
    Session {
        access_token: format!("tok-{user}"),
        principal: Principal {
            user_id: user.to_string(),
            email: format!("{user}@example.edu"),
            display_name: None,
            roles: vec!["student".to_string()],
        },
        issued_at: now,
        expires_at: now + ttl,
    }
}

/// Renderer recording what was shown, as `loading <location>` or `<screen>@<location>`.
#[derive(Default)]
pub struct RecordingRenderer {
    pub frames: Vec<String>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, view: View<'_>) {
        match view {
            View::Loading { location } => self.frames.push(format!("loading {location}")),
            View::Screen(screen) => self.frames.push(format!("{}@{}", screen.name, screen.location)),
        }
    }
}
