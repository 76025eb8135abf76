//! Client-side session store: the single source of truth for "is someone
//! logged in, and as whom".
//!
//! The store starts `Unknown`, resolves once via [`SessionStore::initialize`], and
//! afterwards follows provider pushes. It is the only writer of the state; readers
//! take snapshots or wait on a [`watch::Receiver`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::provider::{IdentityProvider, ListenerId};
use super::session::SessionState;

type ChangeCallback = Arc<dyn Fn(&SessionState) + Send + Sync>;

struct Inner {
    state: watch::Sender<SessionState>,
    callbacks: Mutex<Vec<(u64, ChangeCallback)>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Inner {
    fn publish(&self, next: SessionState) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.state.send_replace(next.clone());
        let callbacks: Vec<ChangeCallback> = self.callbacks.lock().iter().map(|(_, cb)| cb.clone()).collect();
        for cb in callbacks {
            cb(&next);
        }
    }
}

pub struct SessionStore {
    inner: Arc<Inner>,
    provider: Arc<dyn IdentityProvider>,
    provider_listener: Mutex<Option<ListenerId>>,
}

/// Handle returned by [`SessionStore::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.callbacks.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl SessionStore {
    /// Create a store in the `Unknown` state and attach it to the provider's change
    /// feed right away, so no push between creation and `initialize` is lost.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Arc<Self> {
        let (tx, _rx) = watch::channel(SessionState::Unknown);
        let inner = Arc::new(Inner {
            state: tx,
            callbacks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        let weak = Arc::downgrade(&inner);
        let listener = provider.on_session_change(Arc::new(move |event, session| {
            if let Some(inner) = weak.upgrade() {
                debug!(target: "folio::session", ?event, present = session.is_some(), "store.push");
                inner.publish(SessionState::from_option(session.cloned()));
            }
        }));
        Arc::new(Self { inner, provider, provider_listener: Mutex::new(Some(listener)) })
    }

    /// Fetch the existing session once. Never fails: provider errors are logged and
    /// resolve the state to `Absent`. A value pushed by the provider while the fetch
    /// was in flight wins over the fetched one.
    pub async fn initialize(&self) {
        let fetched = match self.provider.current_session().await {
            Ok(session) => SessionState::from_option(session),
            Err(e) => {
                warn!(target: "folio::session", error = %e, "initial session fetch failed; treating viewer as signed out");
                SessionState::Absent
            }
        };
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        let applied = self.inner.state.send_if_modified(|current| {
            if current.is_unknown() {
                *current = fetched.clone();
                true
            } else {
                false
            }
        });
        if applied {
            debug!(target: "folio::session", present = fetched.session().is_some(), "store.initialized");
            let callbacks: Vec<ChangeCallback> = self.inner.callbacks.lock().iter().map(|(_, cb)| cb.clone()).collect();
            for cb in callbacks {
                cb(&fetched);
            }
        }
    }

    /// Current state with expiry applied.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().as_of(Utc::now())
    }

    /// Register `on_change` for every subsequent state change. The callback gets the
    /// complete new state.
    pub fn subscribe<F>(&self, on_change: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.callbacks.lock().push((id, Arc::new(on_change)));
        Subscription { id, inner: Arc::downgrade(&self.inner) }
    }

    pub fn subscriber_count(&self) -> usize { self.inner.callbacks.lock().len() }

    pub fn watch(&self) -> watch::Receiver<SessionState> { self.inner.state.subscribe() }

    pub fn is_closed(&self) -> bool { self.inner.closed.load(Ordering::Acquire) }

    /// Detach from the provider and drop all subscriptions. Waiters on `watch()`
    /// receivers are woken with a closed channel once the store itself is dropped;
    /// `is_closed` flips immediately.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(id) = self.provider_listener.lock().take() {
            self.provider.remove_listener(id);
        }
        self.inner.callbacks.lock().clear();
        // Wake waiters so they observe `closed` and stop.
        self.inner.state.send_modify(|_| {});
        debug!(target: "folio::session", "store.shutdown");
    }

    /// Sign the viewer out through the provider. The resulting push updates the store.
    pub async fn sign_out(&self) -> Result<(), super::IdentityError> {
        self.provider.sign_out().await
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
