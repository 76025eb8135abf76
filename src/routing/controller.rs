//! Route access decisions.
//!
//! [`decide`] is a pure function of the session state, the path classification and
//! the URL query. Precedence (first match wins):
//!
//! 1. session unknown -> `Defer`
//! 2. guest-only screen with a session -> landing
//! 3. authenticated screen without a session -> login
//! 4. token-gated screen: with a session -> landing; without the credential
//!    marker (or with an unparsable query) -> login; otherwise allow
//! 5. allow

use serde::Serialize;

use super::classify::RouteClass;
use super::request::QueryParams;
use crate::identity::SessionState;

/// Redirect targets and the name of the one-time credential parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    pub login_path: String,
    pub landing_path: String,
    pub credential_param: String,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self { login_path: "/login".into(), landing_path: "/".into(), credential_param: "access_token".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "to", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Redirect(String),
    Defer,
}

pub fn decide(state: &SessionState, class: RouteClass, raw_query: &str, policy: &RoutePolicy) -> Decision {
    let signed_in = match state {
        SessionState::Unknown => return Decision::Defer,
        SessionState::Absent => false,
        SessionState::Present(_) => true,
    };
    match class {
        RouteClass::GuestOnly if signed_in => Decision::Redirect(policy.landing_path.clone()),
        RouteClass::Authenticated if !signed_in => Decision::Redirect(policy.login_path.clone()),
        RouteClass::TokenGated => {
            if signed_in {
                return Decision::Redirect(policy.landing_path.clone());
            }
            let has_marker = QueryParams::parse(raw_query)
                .map(|q| q.has_value(&policy.credential_param))
                .unwrap_or(false);
            if has_marker {
                Decision::Allow
            } else {
                Decision::Redirect(policy.login_path.clone())
            }
        }
        _ => Decision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Principal, Session};
    use crate::routing::RouteTable;
    use chrono::Utc;

    fn present() -> SessionState {
        let now = Utc::now();
        SessionState::Present(Session {
            access_token: "tok".into(),
            principal: Principal { user_id: "u1".into(), email: "u1@example.edu".into(), ..Default::default() },
            issued_at: now,
            expires_at: now + chrono::Duration::hours(1),
        })
    }

    fn states() -> Vec<SessionState> { vec![SessionState::Unknown, SessionState::Absent, present()] }

    const QUERIES: &[&str] = &["", "?access_token=abc", "access_token=", "access_token=%zz", "x=1&access_token=t0k", "?&&"];

    fn run(state: &SessionState, path: &str, query: &str) -> Decision {
        let table = RouteTable::portfolio();
        decide(state, table.classify(path), query, &RoutePolicy::default())
    }

    #[test]
    fn authenticated_paths() {
        for path in ["/", "/profile", "/submit", "/project/9", "/users", "/user/abc", "/unregistered"] {
            for q in QUERIES {
                assert_eq!(run(&SessionState::Absent, path, q), Decision::Redirect("/login".into()), "{path}{q}");
                assert_eq!(run(&present(), path, q), Decision::Allow, "{path}{q}");
            }
        }
    }

    #[test]
    fn guest_only_paths() {
        for path in ["/login", "/register"] {
            for q in QUERIES {
                assert_eq!(run(&present(), path, q), Decision::Redirect("/".into()));
                assert_eq!(run(&SessionState::Absent, path, q), Decision::Allow);
            }
        }
    }

    #[test]
    fn token_gated_with_session_goes_to_landing() {
        for q in QUERIES {
            assert_eq!(run(&present(), "/update-password", q), Decision::Redirect("/".into()));
        }
    }

    #[test]
    fn token_gated_requires_marker() {
        let allow = ["?access_token=abc", "x=1&access_token=t0k"];
        for q in QUERIES {
            let expected = if allow.contains(q) { Decision::Allow } else { Decision::Redirect("/login".into()) };
            assert_eq!(run(&SessionState::Absent, "/update-password", q), expected, "{q}");
        }
    }

    #[test]
    fn unknown_always_defers() {
        for path in ["/", "/login", "/register", "/update-password", "/profile", "/nowhere"] {
            for q in QUERIES {
                assert_eq!(run(&SessionState::Unknown, path, q), Decision::Defer);
            }
        }
    }

    #[test]
    fn decisions_are_repeatable() {
        for s in states() {
            for q in QUERIES {
                assert_eq!(run(&s, "/update-password", q), run(&s, "/update-password", q));
            }
        }
    }

    #[test]
    fn documented_scenarios() {
        assert_eq!(run(&present(), "/login", ""), Decision::Redirect("/".into()));
        assert_eq!(run(&SessionState::Absent, "/update-password", ""), Decision::Redirect("/login".into()));
        assert_eq!(run(&SessionState::Absent, "/update-password", "?access_token=abc"), Decision::Allow);
        assert_eq!(run(&SessionState::Absent, "/profile", ""), Decision::Redirect("/login".into()));
        assert_eq!(run(&SessionState::Unknown, "/profile", ""), Decision::Defer);
    }

    #[test]
    fn custom_policy_targets() {
        let policy = RoutePolicy { login_path: "/signin".into(), landing_path: "/home".into(), credential_param: "code".into() };
        assert_eq!(decide(&SessionState::Absent, RouteClass::Authenticated, "", &policy), Decision::Redirect("/signin".into()));
        assert_eq!(decide(&present(), RouteClass::GuestOnly, "", &policy), Decision::Redirect("/home".into()));
        assert_eq!(decide(&SessionState::Absent, RouteClass::TokenGated, "code=1", &policy), Decision::Allow);
        assert_eq!(decide(&SessionState::Absent, RouteClass::TokenGated, "access_token=1", &policy), Decision::Redirect("/signin".into()));
    }
}
