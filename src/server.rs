//!
//! folio HTTP server
//! -----------------
//! Axum-based HTTP surface for the portfolio front end.
//!
//! Responsibilities:
//! - Session management with a simple cookie + CSRF token model.
//! - Register/login/logout and password recovery backed by the `identity` module.
//! - Scoring endpoints delegating to the remote AI service.
//! - Screen requests gated by the route access controller: allowed screens are
//!   returned as JSON descriptors, denied ones answer `303 See Other`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::FolioConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{AccountDirectory, Principal, Session, SessionManager, SessionState};
use crate::routing::{decide, Decision, NavigationRequest, RoutePolicy, RouteTable, Screen};
use crate::scoring::{ProjectDigest, ScoringClient, Submission};

pub const SESSION_COOKIE: &str = "folio_session";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const UPDATE_PASSWORD_PATH: &str = "/update-password";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FolioConfig>,
    pub directory: Arc<AccountDirectory>,
    pub sessions: Arc<SessionManager>,
    /// Session token -> CSRF token mapping
    pub csrf_tokens: Arc<RwLock<HashMap<String, String>>>,
    pub routes: Arc<RouteTable>,
    pub policy: RoutePolicy,
    pub scoring: ScoringClient,
}

impl AppState {
    pub fn new(config: FolioConfig) -> anyhow::Result<Self> {
        let scoring = ScoringClient::new(&config.scoring_url, config.scoring_timeout)
            .with_context(|| format!("While creating scoring client for {}", config.scoring_url))?;
        Ok(Self {
            policy: config.route_policy(),
            directory: Arc::new(AccountDirectory::new()),
            sessions: Arc::new(SessionManager::new(config.session_ttl)),
            csrf_tokens: Arc::new(RwLock::new(HashMap::new())),
            routes: Arc::new(RouteTable::portfolio()),
            scoring,
            config: Arc::new(config),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "folio ok" }))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/csrf", get(get_csrf))
        .route("/auth/recover", post(recover))
        .route("/auth/update-password", post(update_password))
        .route("/api/submit", post(submit))
        .route("/api/suggestion", get(suggestion))
        .route("/api/summary", post(summary))
        .fallback(screen)
        .with_state(state)
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn run(config: FolioConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.http_port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_host, config.http_port))?;
    info!(
        target: "folio::http",
        "folio starting: addr={}, scoring_url={}, session_ttl_secs={}, expose_recovery_links={}",
        addr, config.scoring_url, config.session_ttl.as_secs(), config.expose_recovery_links
    );
    let state = AppState::new(config)?;
    let listener = TcpListener::bind(addr).await.with_context(|| format!("While binding {}", addr))?;
    info!(target: "folio::http", "Starting server on {}", addr);
    serve(listener, state).await
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    email: String,
    password: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginPayload { email: String, password: String }

#[derive(Debug, Deserialize)]
struct RecoverPayload { email: String }

#[derive(Debug, Deserialize)]
struct UpdatePasswordPayload { access_token: String, password: String }

#[derive(Debug, Deserialize)]
struct SuggestionQuery {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    file_url: Option<String>,
    #[serde(default)]
    grade: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SummaryPayload { projects: Vec<ProjectDigest> }

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE).iter() {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name { return Some(v.to_string()); }
            }
        }
    }
    None
}

fn session_from_headers(state: &AppState, headers: &HeaderMap) -> Option<Session> {
    let token = parse_cookie(headers, SESSION_COOKIE)?;
    state.sessions.validate(&token)
}

fn require_session(state: &AppState, headers: &HeaderMap) -> AppResult<Session> {
    session_from_headers(state, headers).ok_or_else(|| AppError::auth("unauthorized", "sign in required"))
}

async fn validate_csrf(state: &AppState, session: &Session, headers: &HeaderMap) -> AppResult<()> {
    let provided = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    let cmap = state.csrf_tokens.read().await;
    match (cmap.get(&session.access_token), provided) {
        (Some(expected), Some(p)) if expected == p => Ok(()),
        _ => Err(AppError::csrf("csrf", "invalid csrf")),
    }
}

fn session_cookie(state: &AppState, token: &str) -> AppResult<HeaderValue> {
    let secure = if state.config.secure_cookies { "; Secure" } else { "" };
    HeaderValue::from_str(&format!("{}={}; HttpOnly{}; SameSite=Strict; Path=/", SESSION_COOKIE, token, secure))
        .map_err(|e| AppError::internal("cookie".to_string(), e.to_string()))
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("folio_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/")
}

/// Issue a session with its CSRF token and build the sign-in response.
async fn start_session(state: &AppState, principal: Principal) -> AppResult<Response> {
    let session = state.sessions.issue(principal)?;
    let csrf = crate::identity::new_csrf_token()?;
    {
        let mut cmap = state.csrf_tokens.write().await;
        // Issuing swept expired sessions; drop their CSRF entries too.
        cmap.retain(|token, _| state.sessions.contains(token));
        cmap.insert(session.access_token.clone(), csrf);
    }
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(state, &session.access_token)?);
    let body = json!({
        "status": "ok",
        "user": session.principal,
        "expires_at": session.expires_at,
    });
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

async fn register(State(state): State<AppState>, Json(payload): Json<RegisterPayload>) -> AppResult<Response> {
    let principal = state.directory.sign_up(&payload.email, &payload.password, payload.display_name)?;
    info!(target: "folio::http", user = %principal.user_id, "register");
    start_session(&state, principal).await
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> AppResult<Response> {
    let principal = state.directory.verify(&payload.email, &payload.password)?;
    info!(target: "folio::http", user = %principal.user_id, "login");
    start_session(&state, principal).await
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let session = require_session(&state, &headers)?;
    validate_csrf(&state, &session, &headers).await?;
    state.sessions.logout(&session.access_token);
    state.csrf_tokens.write().await.remove(&session.access_token);
    let mut h = HeaderMap::new();
    h.insert(header::SET_COOKIE, clear_session_cookie());
    Ok((StatusCode::OK, h, Json(json!({"status":"ok"}))).into_response())
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<serde_json::Value>> {
    let session = require_session(&state, &headers)?;
    let cmap = state.csrf_tokens.read().await;
    match cmap.get(&session.access_token) {
        Some(token) => Ok(Json(json!({"status":"ok","csrf": token}))),
        None => Err(AppError::internal("csrf_unavailable", "csrf not available")),
    }
}

async fn recover(State(state): State<AppState>, Json(payload): Json<RecoverPayload>) -> AppResult<Json<serde_json::Value>> {
    let link = state.directory.issue_recovery(&payload.email)?.map(|token| {
        format!("{}?{}={}", UPDATE_PASSWORD_PATH, state.policy.credential_param, urlencoding::encode(&token))
    });
    // Same answer whether or not the account exists.
    let mut body = json!({"status":"ok","message":"if the account exists, a reset link was sent"});
    if let Some(link) = link {
        info!(target: "folio::http", email = %payload.email.trim().to_lowercase(), "recovery link issued");
        if state.config.expose_recovery_links {
            body["recovery_link"] = json!(link);
        }
    }
    Ok(Json(body))
}

async fn update_password(State(state): State<AppState>, Json(payload): Json<UpdatePasswordPayload>) -> AppResult<Json<serde_json::Value>> {
    let principal = state.directory.redeem_recovery(&payload.access_token, &payload.password)?;
    let revoked = state.sessions.revoke_user(&principal.user_id);
    {
        let mut cmap = state.csrf_tokens.write().await;
        for token in &revoked {
            cmap.remove(token);
        }
    }
    info!(target: "folio::http", user = %principal.user_id, revoked = revoked.len(), "password updated");
    Ok(Json(json!({"status":"ok","redirect": state.policy.login_path})))
}

async fn submit(State(state): State<AppState>, headers: HeaderMap, Json(mut submission): Json<Submission>) -> AppResult<Json<serde_json::Value>> {
    let session = require_session(&state, &headers)?;
    validate_csrf(&state, &session, &headers).await?;
    if submission.student_name.as_deref().map(str::trim).unwrap_or("").is_empty() {
        submission.student_name = Some(session.principal.label().to_string());
    }
    let feedback = state.scoring.score(&submission).await.map_err(|e| {
        error!(target: "folio::http", error = %e, "scoring failed");
        AppError::from(e)
    })?;
    Ok(Json(json!({
        "status": "ok",
        "student_name": submission.student_name,
        "ai_score": feedback.ai_score,
        "ai_suggestions": feedback.ai_suggestions,
        "learning_path": feedback.learning_path,
    })))
}

async fn suggestion(State(state): State<AppState>, headers: HeaderMap, Query(q): Query<SuggestionQuery>) -> AppResult<Json<serde_json::Value>> {
    require_session(&state, &headers)?;
    let text = state.scoring.suggestion(&q.title, &q.description, q.file_url.as_deref(), q.grade).await?;
    Ok(Json(json!({"status":"ok","suggestion": text})))
}

async fn summary(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<SummaryPayload>) -> AppResult<Json<serde_json::Value>> {
    let session = require_session(&state, &headers)?;
    validate_csrf(&state, &session, &headers).await?;
    let text = state.scoring.summarize(&payload.projects).await?;
    Ok(Json(json!({"status":"ok","summary": text})))
}

/// Screen requests: run the access controller for the requested location.
async fn screen(State(state): State<AppState>, method: Method, uri: Uri, headers: HeaderMap) -> AppResult<Response> {
    if method != Method::GET {
        return Err(AppError::not_found("not_found".to_string(), format!("no route for {} {}", method, uri.path())));
    }
    let req = NavigationRequest::new(uri.path(), uri.query().unwrap_or(""));
    // The server resolves the cookie synchronously, so the state is never Unknown here.
    let session_state = SessionState::from_option(session_from_headers(&state, &headers));
    let class = state.routes.classify(&req.path);
    match decide(&session_state, class, &req.raw_query, &state.policy) {
        Decision::Allow => {
            let viewer = session_state.session().map(|s| s.principal.clone());
            let screen = Screen::resolve(&state.routes, &req, viewer);
            Ok(Json(screen).into_response())
        }
        Decision::Redirect(to) => {
            info!(target: "folio::routing", from = %req.location(), to = %to, "screen redirect");
            let location = HeaderValue::from_str(&to).map_err(|e| AppError::internal("redirect".to_string(), e.to_string()))?;
            Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
        }
        Decision::Defer => Err(AppError::io("session_pending", "session not resolved")),
    }
}
