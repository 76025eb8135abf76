//! Navigation shell: every screen transition passes through the access gate.
//!
//! Each attempt runs `Unknown -> Deciding -> {Allowed | Redirecting}`. A deferred
//! decision drops back to `Unknown`, renders a loading view and waits for the
//! session store to change before deciding again. Redirects replace the disallowed
//! location, so it never lands in history.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::classify::RouteTable;
use super::controller::{decide, Decision, RoutePolicy};
use super::request::NavigationRequest;
use super::screen::Screen;
use crate::identity::SessionStore;

pub const DEFAULT_MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Unknown,
    Deciding,
    Allowed,
    Redirecting,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("illegal navigation transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: NavState,
    pub to: NavState,
}

/// State machine of a single navigation attempt.
#[derive(Debug, Clone)]
pub struct NavigationAttempt {
    state: NavState,
    trace: Vec<NavState>,
}

impl Default for NavigationAttempt {
    fn default() -> Self { Self { state: NavState::Unknown, trace: vec![NavState::Unknown] } }
}

impl NavigationAttempt {
    pub fn state(&self) -> NavState { self.state }

    pub fn trace(&self) -> &[NavState] { &self.trace }

    pub fn is_terminal(&self) -> bool { matches!(self.state, NavState::Allowed | NavState::Redirecting) }

    pub fn transition(&mut self, to: NavState) -> Result<(), IllegalTransition> {
        use NavState::*;
        let legal = matches!(
            (self.state, to),
            (Unknown, Deciding) | (Deciding, Unknown) | (Deciding, Allowed) | (Deciding, Redirecting)
        );
        if !legal {
            return Err(IllegalTransition { from: self.state, to });
        }
        self.state = to;
        self.trace.push(to);
        Ok(())
    }
}

/// Back-stack of visited locations.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<String>,
    index: usize,
}

impl History {
    pub fn push(&mut self, location: String) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(location);
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, location: String) {
        match self.entries.get_mut(self.index) {
            Some(slot) => *slot = location,
            None => self.push(location),
        }
    }

    pub fn current(&self) -> Option<&str> { self.entries.get(self.index).map(String::as_str) }

    pub fn entries(&self) -> &[String] { &self.entries }

    /// Entry before the current one, without moving.
    pub fn previous(&self) -> Option<&str> {
        if self.index == 0 {
            return None;
        }
        self.entries.get(self.index - 1).map(String::as_str)
    }

    fn step_back(&mut self) -> Option<String> {
        let previous = self.previous()?.to_string();
        self.index -= 1;
        Some(previous)
    }
}

pub enum View<'a> {
    Loading { location: &'a str },
    Screen(&'a Screen),
}

pub trait Renderer {
    fn render(&mut self, view: View<'_>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Rendered(Screen),
    /// The session store shut down before the attempt could be decided.
    Cancelled,
    /// Too many chained redirects; nothing was rendered.
    RedirectLoop { location: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryMode {
    Push,
    Replace,
    /// Step back one entry, then replace it. Applied only once a screen renders.
    Back,
}

pub struct NavigationShell {
    store: Arc<SessionStore>,
    table: Arc<RouteTable>,
    policy: RoutePolicy,
    history: History,
    max_redirects: usize,
    attempts: Vec<NavigationAttempt>,
}

impl NavigationShell {
    pub fn new(store: Arc<SessionStore>, table: Arc<RouteTable>, policy: RoutePolicy) -> Self {
        Self { store, table, policy, history: History::default(), max_redirects: DEFAULT_MAX_REDIRECTS, attempts: Vec::new() }
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn history(&self) -> &History { &self.history }

    pub fn current_location(&self) -> Option<&str> { self.history.current() }

    /// Attempts made by the most recent navigation, in order (one per redirect hop).
    pub fn last_attempts(&self) -> &[NavigationAttempt] { &self.attempts }

    pub fn store(&self) -> &Arc<SessionStore> { &self.store }

    pub async fn navigate<R: Renderer>(&mut self, location: &str, renderer: &mut R) -> NavigationOutcome {
        self.run(location, EntryMode::Push, renderer).await
    }

    /// Go to the previous history entry, through the gate again.
    pub async fn back<R: Renderer>(&mut self, renderer: &mut R) -> Option<NavigationOutcome> {
        let previous = self.history.previous()?.to_string();
        Some(self.run(&previous, EntryMode::Back, renderer).await)
    }

    /// Re-run the gate for the current entry, e.g. after the session changed.
    pub async fn revalidate<R: Renderer>(&mut self, renderer: &mut R) -> Option<NavigationOutcome> {
        let current = self.history.current()?.to_string();
        Some(self.run(&current, EntryMode::Replace, renderer).await)
    }

    async fn run<R: Renderer>(&mut self, location: &str, mode: EntryMode, renderer: &mut R) -> NavigationOutcome {
        self.attempts.clear();
        let mut target = NavigationRequest::parse(location);
        let mut rx = self.store.watch();

        for hop in 0..=self.max_redirects {
            let mut attempt = NavigationAttempt::default();
            loop {
                // Mark the current value seen before checking for shutdown, so a
                // shutdown after this point still wakes `changed()`.
                let _ = rx.borrow_and_update();
                if self.store.is_closed() {
                    debug!(target: "folio::routing", location = %target.location(), "navigation cancelled");
                    self.attempts.push(attempt);
                    return NavigationOutcome::Cancelled;
                }
                if let Err(e) = attempt.transition(NavState::Deciding) {
                    warn!(target: "folio::routing", error = %e, "navigation state machine");
                    self.attempts.push(attempt);
                    return NavigationOutcome::Cancelled;
                }
                let state = self.store.snapshot();
                let class = self.table.classify(&target.path);
                match decide(&state, class, &target.raw_query, &self.policy) {
                    Decision::Defer => {
                        let _ = attempt.transition(NavState::Unknown);
                        let loc = target.location();
                        renderer.render(View::Loading { location: &loc });
                        if rx.changed().await.is_err() || self.store.is_closed() {
                            self.attempts.push(attempt);
                            return NavigationOutcome::Cancelled;
                        }
                    }
                    Decision::Allow => {
                        let _ = attempt.transition(NavState::Allowed);
                        self.attempts.push(attempt);
                        let viewer = state.session().map(|s| s.principal.clone());
                        let screen = Screen::resolve(&self.table, &target, viewer);
                        match mode {
                            EntryMode::Push => self.history.push(screen.location.clone()),
                            EntryMode::Replace => self.history.replace(screen.location.clone()),
                            EntryMode::Back => {
                                self.history.step_back();
                                self.history.replace(screen.location.clone());
                            }
                        }
                        debug!(target: "folio::routing", location = %screen.location, screen = %screen.name, hop, "navigation allowed");
                        renderer.render(View::Screen(&screen));
                        return NavigationOutcome::Rendered(screen);
                    }
                    Decision::Redirect(to) => {
                        let _ = attempt.transition(NavState::Redirecting);
                        self.attempts.push(attempt);
                        info!(target: "folio::routing", from = %target.location(), to = %to, "navigation redirected");
                        target = NavigationRequest::parse(&to);
                        break;
                    }
                }
            }
        }
        warn!(target: "folio::routing", location = %target.location(), max = self.max_redirects, "redirect limit reached");
        NavigationOutcome::RedirectLoop { location: target.location() }
    }
}
