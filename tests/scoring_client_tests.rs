//! Scoring client tests against a local stand-in for the AI service.

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use folio::scoring::{ProjectDigest, ScoringClient, ScoringError, Submission};

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn submission() -> Submission {
    Submission { title: "Robot".into(), description: "Line follower".into(), ..Default::default() }
}

#[tokio::test]
async fn accepts_prefixed_field_names_and_clamps() {
    let app = Router::new().route(
        "/api/score",
        post(|| async { Json(json!({"ai_score": -2.0, "ai_suggestions": "more docs"})) }),
    );
    let base = spawn(app).await;
    let client = ScoringClient::new(&format!("{base}/api"), Duration::from_secs(5)).unwrap();
    let fb = client.score(&submission()).await.unwrap();
    assert_eq!(fb.ai_score, 0.0);
    assert_eq!(fb.ai_suggestions, "more docs");
    assert_eq!(fb.learning_path, "");
}

#[tokio::test]
async fn error_statuses_keep_the_body() {
    let app = Router::new().route(
        "/score",
        post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "missing description") }),
    );
    let base = spawn(app).await;
    let client = ScoringClient::new(&base, Duration::from_secs(5)).unwrap();
    match client.score(&submission()).await {
        Err(ScoringError::Status { status, body }) => {
            assert_eq!(status, 422);
            assert_eq!(body, "missing description");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn slow_service_times_out() {
    let app = Router::new().route(
        "/score",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"score": 5.0}))
        }),
    );
    let base = spawn(app).await;
    let client = ScoringClient::new(&base, Duration::from_millis(100)).unwrap();
    assert!(matches!(client.score(&submission()).await, Err(ScoringError::Transport(_))));
}

#[tokio::test]
async fn summary_sends_the_average_grade() {
    let app = Router::new().route(
        "/summary",
        post(|Json(v): Json<Value>| async move {
            Json(json!({"summary": format!("{} projects, average {}", v["projects"].as_array().map(|a| a.len()).unwrap_or(0), v["average_grade"])}))
        }),
    );
    let base = spawn(app).await;
    let client = ScoringClient::new(&base, Duration::from_secs(5)).unwrap();
    let projects = vec![
        ProjectDigest { title: "a".into(), description: "x".into(), grade: Some(9.0), file_urls: vec![] },
        ProjectDigest { title: "b".into(), description: "y".into(), grade: None, file_urls: vec![] },
    ];
    assert_eq!(client.summarize(&projects).await.unwrap(), "2 projects, average 9.0");
    assert!(matches!(client.summarize(&[]).await, Err(ScoringError::InvalidRequest(_))));
}
