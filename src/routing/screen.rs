use std::collections::BTreeMap;

use serde::Serialize;

use super::classify::{RouteClass, RouteTable};
use super::request::NavigationRequest;
use crate::identity::Principal;

pub const NOT_FOUND_SCREEN: &str = "not_found";

/// A screen the gate allowed, ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screen {
    pub location: String,
    pub name: String,
    pub class: RouteClass,
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub viewer: Option<Principal>,
}

impl Screen {
    pub fn resolve(table: &RouteTable, req: &NavigationRequest, viewer: Option<Principal>) -> Self {
        let query = req.query().map(|q| q.as_map().clone()).unwrap_or_default();
        match table.resolve(&req.path) {
            Some(m) => Screen { location: req.location(), name: m.screen, class: m.class, params: m.params, query, viewer },
            None => Screen {
                location: req.location(),
                name: NOT_FOUND_SCREEN.to_string(),
                class: RouteClass::Authenticated,
                params: BTreeMap::new(),
                query,
                viewer,
            },
        }
    }
}
