//! Session-gated navigation: path classification, the access decision table and
//! the shell that enforces it on every screen transition.

mod classify;
mod controller;
mod request;
mod screen;
mod shell;

pub use classify::{RouteClass, RouteMatch, RouteTable, RouteTableBuilder, RouteTableError};
pub use controller::{decide, Decision, RoutePolicy};
pub use request::{normalize_path, NavigationRequest, QueryError, QueryParams};
pub use screen::{Screen, NOT_FOUND_SCREEN};
pub use shell::{
    History, IllegalTransition, NavState, NavigationAttempt, NavigationOutcome, NavigationShell, Renderer, View,
    DEFAULT_MAX_REDIRECTS,
};
