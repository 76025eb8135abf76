//! Runtime configuration shared by the server and the shell client.
//!
//! Values come from `FOLIO_*` environment variables; binaries may override them
//! with command-line flags (flag > env > default).

use std::env;
use std::time::Duration;

use crate::routing::RoutePolicy;

pub const DEFAULT_HTTP_PORT: u16 = 7878;
pub const DEFAULT_SCORING_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone)]
pub struct FolioConfig {
    pub bind_host: String,
    pub http_port: u16,
    /// Base URL of the remote AI scoring service.
    pub scoring_url: String,
    pub scoring_timeout: Duration,
    pub session_ttl: Duration,
    pub login_path: String,
    pub landing_path: String,
    /// Query parameter carrying the one-time credential on token-gated screens.
    pub credential_param: String,
    /// Echo password recovery links in HTTP responses instead of only logging them.
    pub expose_recovery_links: bool,
    pub secure_cookies: bool,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            scoring_url: DEFAULT_SCORING_URL.to_string(),
            scoring_timeout: Duration::from_secs(60),
            session_ttl: Duration::from_secs(60 * 60),
            login_path: "/login".to_string(),
            landing_path: "/".to_string(),
            credential_param: "access_token".to_string(),
            expose_recovery_links: false,
            secure_cookies: true,
        }
    }
}

impl FolioConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = env::var("FOLIO_BIND_HOST") { cfg.bind_host = v; }
        if let Some(p) = parse_port_env("FOLIO_HTTP_PORT") { cfg.http_port = p; }
        if let Ok(v) = env::var("FOLIO_SCORING_URL") { cfg.scoring_url = v; }
        if let Some(ms) = parse_u64_env("FOLIO_SCORING_TIMEOUT_MS") { cfg.scoring_timeout = Duration::from_millis(ms); }
        if let Some(s) = parse_u64_env("FOLIO_SESSION_TTL_SECS") { cfg.session_ttl = Duration::from_secs(s); }
        if let Ok(v) = env::var("FOLIO_LOGIN_PATH") { cfg.login_path = v; }
        if let Ok(v) = env::var("FOLIO_LANDING_PATH") { cfg.landing_path = v; }
        if let Ok(v) = env::var("FOLIO_CREDENTIAL_PARAM") { cfg.credential_param = v; }
        if let Some(b) = parse_bool_env("FOLIO_EXPOSE_RECOVERY_LINKS") { cfg.expose_recovery_links = b; }
        if let Some(b) = parse_bool_env("FOLIO_SECURE_COOKIES") { cfg.secure_cookies = b; }
        cfg
    }

    /// Apply `--flag value` overrides on top of the current values.
    pub fn apply_args(&mut self, args: &[String]) {
        if let Some(p) = parse_port_arg(args, "--http-port") { self.http_port = p; }
        if let Some(v) = arg_value(args, "--bind") { self.bind_host = v; }
        if let Some(v) = arg_value(args, "--scoring-url") { self.scoring_url = v; }
        if let Some(ms) = arg_value(args, "--scoring-timeout-ms").and_then(|s| s.parse::<u64>().ok()) {
            self.scoring_timeout = Duration::from_millis(ms);
        }
        if has_flag(args, "--expose-recovery-links") { self.expose_recovery_links = true; }
        if has_flag(args, "--insecure-cookies") { self.secure_cookies = false; }
    }

    pub fn route_policy(&self) -> RoutePolicy {
        RoutePolicy {
            login_path: self.login_path.clone(),
            landing_path: self.landing_path.clone(),
            credential_param: self.credential_param.clone(),
        }
    }
}

fn parse_port_env(name: &str) -> Option<u16> {
    env::var(name).ok().and_then(|v| v.parse::<u16>().ok())
}

fn parse_u64_env(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

fn parse_bool_env(name: &str) -> Option<bool> {
    match env::var(name) {
        Ok(v) => parse_bool(&v),
        Err(_) => None,
    }
}

pub fn parse_bool(v: &str) -> Option<bool> {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    arg_value(args, flag).and_then(|v| v.parse::<u16>().ok())
}

pub fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> { v.iter().map(|s| s.to_string()).collect() }

    #[test]
    fn flags_override_defaults() {
        let mut cfg = FolioConfig::default();
        cfg.apply_args(&args(&["folio_server", "--http-port", "9001", "--scoring-url", "http://ai:9000", "--expose-recovery-links"]));
        assert_eq!(cfg.http_port, 9001);
        assert_eq!(cfg.scoring_url, "http://ai:9000");
        assert!(cfg.expose_recovery_links);
        assert!(cfg.secure_cookies);
    }

    #[test]
    fn bad_port_flag_is_ignored() {
        let mut cfg = FolioConfig::default();
        cfg.apply_args(&args(&["--http-port", "not-a-port"]));
        assert_eq!(cfg.http_port, DEFAULT_HTTP_PORT);
    }

    #[test]
    fn bool_parsing() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn route_policy_carries_paths() {
        let p = FolioConfig::default().route_policy();
        assert_eq!(p.login_path, "/login");
        assert_eq!(p.landing_path, "/");
        assert_eq!(p.credential_param, "access_token");
    }
}
