use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

/// Static access policy attached to a navigable path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Only reachable while signed out (login, registration).
    GuestOnly,
    /// Only reachable with a one-time credential in the URL and no session.
    TokenGated,
    /// Only reachable while signed in.
    Authenticated,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route pattern must start with '/': {0}")]
    NotAbsolute(String),
    #[error("route pattern has an empty parameter name: {0}")]
    EmptyParam(String),
    #[error("route pattern registered twice: {0}")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    fn parse(raw: &str) -> Result<Self, RouteTableError> {
        if !raw.starts_with('/') {
            return Err(RouteTableError::NotAbsolute(raw.to_string()));
        }
        let mut segments = Vec::new();
        for part in raw.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(RouteTableError::EmptyParam(raw.to_string()));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }
        Ok(Self { raw: raw.to_string(), segments })
    }

    /// Shape key used for duplicate detection: `/project/:id` and `/project/:slug`
    /// collide.
    fn shape(&self) -> String {
        let parts: Vec<&str> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.as_str(),
                Segment::Param(_) => ":",
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    fn literal_count(&self) -> usize {
        self.segments.iter().filter(|s| matches!(s, Segment::Literal(_))).count()
    }

    fn matches(&self, parts: &[&str]) -> Option<BTreeMap<String, String>> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (seg, part) in self.segments.iter().zip(parts) {
            match seg {
                Segment::Literal(l) if l.as_str() == *part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = urlencoding::decode(part).map(|v| v.into_owned()).unwrap_or_else(|_| part.to_string());
                    params.insert(name.clone(), value);
                }
            }
        }
        Some(params)
    }
}

#[derive(Debug, Clone)]
struct RouteEntry {
    pattern: PathPattern,
    class: RouteClass,
    screen: String,
}

/// A registered screen resolved from a concrete path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    pub pattern: String,
    pub screen: String,
    pub class: RouteClass,
    pub params: BTreeMap<String, String>,
}

/// Immutable path-pattern -> classification table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    entries: Vec<RouteEntry>,
    shapes: HashSet<String>,
    error: Option<RouteTableError>,
}

impl RouteTableBuilder {
    pub fn route(mut self, pattern: &str, class: RouteClass, screen: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match PathPattern::parse(pattern) {
            Ok(p) => {
                if !self.shapes.insert(p.shape()) {
                    self.error = Some(RouteTableError::Duplicate(pattern.to_string()));
                } else {
                    self.entries.push(RouteEntry { pattern: p, class, screen: screen.to_string() });
                }
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn guest_only(self, pattern: &str, screen: &str) -> Self { self.route(pattern, RouteClass::GuestOnly, screen) }
    pub fn token_gated(self, pattern: &str, screen: &str) -> Self { self.route(pattern, RouteClass::TokenGated, screen) }
    pub fn authenticated(self, pattern: &str, screen: &str) -> Self { self.route(pattern, RouteClass::Authenticated, screen) }

    pub fn build(self) -> Result<RouteTable, RouteTableError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(RouteTable { entries: self.entries }),
        }
    }
}

/// Split a normalized path into its non-empty segments.
fn path_parts(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder { RouteTableBuilder::default() }

    /// Screens of the portfolio application.
    pub fn portfolio() -> Self {
        Self::builder()
            .guest_only("/login", "login")
            .guest_only("/register", "register")
            .token_gated("/update-password", "update_password")
            .authenticated("/", "home")
            .authenticated("/submit", "submit_project")
            .authenticated("/profile", "profile")
            .authenticated("/project/:id", "project_detail")
            .authenticated("/users", "users")
            .authenticated("/user/:id", "user_detail")
            .build()
            .expect("portfolio route table is statically valid")
    }

    /// Resolve `path` to its registered screen. When several patterns match, the one
    /// with the most literal segments wins.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let parts = path_parts(path);
        self.entries
            .iter()
            .filter_map(|e| e.pattern.matches(&parts).map(|params| (e, params)))
            .max_by_key(|(e, _)| e.pattern.literal_count())
            .map(|(e, params)| RouteMatch {
                pattern: e.pattern.raw.clone(),
                screen: e.screen.clone(),
                class: e.class,
                params,
            })
    }

    /// Classification of `path`; unregistered paths require a session.
    pub fn classify(&self, path: &str) -> RouteClass {
        self.resolve(path).map(|m| m.class).unwrap_or(RouteClass::Authenticated)
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
