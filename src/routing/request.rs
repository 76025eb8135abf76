use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid percent escape at byte {0}")]
    BadEscape(usize),
    #[error("query component is not valid UTF-8")]
    InvalidUtf8,
}

/// Decoded query-string parameters. Repeated keys keep their first value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, String>,
}

fn check_escapes(s: &str) -> Result<(), QueryError> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let ok = i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !ok {
                return Err(QueryError::BadEscape(i));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

fn decode_component(raw: &str) -> Result<String, QueryError> {
    check_escapes(raw)?;
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map(|c| c.into_owned()).map_err(|_| QueryError::InvalidUtf8)
}

impl QueryParams {
    /// Parse a raw query string (with or without the leading `?`). Any malformed
    /// component fails the whole parse.
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut params = BTreeMap::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(k)?;
            let value = decode_component(v)?;
            params.entry(key).or_insert(value);
        }
        Ok(Self { params })
    }

    pub fn get(&self, key: &str) -> Option<&str> { self.params.get(key).map(String::as_str) }

    /// True when `key` is present with a non-blank value.
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).map(|v| !v.trim().is_empty()).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool { self.params.is_empty() }

    pub fn as_map(&self) -> &BTreeMap<String, String> { &self.params }
}

/// One navigation attempt: normalized path plus the undecoded query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub path: String,
    pub raw_query: String,
}

/// Collapse empty segments and strip the trailing slash; `""` becomes `/`.
pub fn normalize_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", parts.join("/"))
}

impl NavigationRequest {
    pub fn new(path: &str, raw_query: &str) -> Self {
        Self { path: normalize_path(path), raw_query: raw_query.strip_prefix('?').unwrap_or(raw_query).to_string() }
    }

    /// Split a location such as `/update-password?access_token=abc#top`. The fragment
    /// is dropped.
    pub fn parse(location: &str) -> Self {
        let without_fragment = location.split_once('#').map(|(l, _)| l).unwrap_or(location);
        let (path, query) = without_fragment.split_once('?').unwrap_or((without_fragment, ""));
        Self::new(path, query)
    }

    pub fn query(&self) -> Result<QueryParams, QueryError> { QueryParams::parse(&self.raw_query) }

    /// Location string as stored in history.
    pub fn location(&self) -> String {
        if self.raw_query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.raw_query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_location_parts() {
        let r = NavigationRequest::parse("/update-password/?access_token=abc&type=recovery#frag");
        assert_eq!(r.path, "/update-password");
        assert_eq!(r.raw_query, "access_token=abc&type=recovery");
        assert_eq!(r.location(), "/update-password?access_token=abc&type=recovery");
        assert_eq!(NavigationRequest::parse("").path, "/");
        assert_eq!(NavigationRequest::parse("//users//").location(), "/users");
    }

    #[test]
    fn decodes_params() {
        let q = QueryParams::parse("?q=ana+lee&x=%41%42&flag").unwrap();
        assert_eq!(q.get("q"), Some("ana lee"));
        assert_eq!(q.get("x"), Some("AB"));
        assert_eq!(q.get("flag"), Some(""));
        assert!(!q.has_value("flag"));
        assert!(q.has_value("q"));
    }

    #[test]
    fn first_value_wins() {
        let q = QueryParams::parse("a=1&a=2").unwrap();
        assert_eq!(q.get("a"), Some("1"));
    }

    #[test]
    fn malformed_escapes_fail() {
        assert_eq!(QueryParams::parse("access_token=%zz"), Err(QueryError::BadEscape(0)));
        assert_eq!(QueryParams::parse("access_token=ab%"), Err(QueryError::BadEscape(2)));
        assert_eq!(QueryParams::parse("k=%ff%fe"), Err(QueryError::InvalidUtf8));
    }
}
