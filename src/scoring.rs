//! Client for the remote AI scoring service.
//!
//! The service is opaque: it receives submission metadata and file references and
//! answers with a score, suggestions and a learning path. Calls can be slow, so
//! every request carries the configured timeout.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AppError;

pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("invalid scoring service URL: {0}")]
    InvalidUrl(String),
    #[error("invalid scoring request: {0}")]
    InvalidRequest(String),
    #[error("scoring service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("scoring service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        let msg = err.to_string();
        match err {
            ScoringError::InvalidRequest(_) => AppError::user("invalid_submission".into(), msg),
            ScoringError::InvalidUrl(_) => AppError::internal("scoring_misconfigured".into(), msg),
            ScoringError::Transport(_) | ScoringError::Status { .. } => AppError::upstream("scoring_failed".into(), msg),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub file_urls: Vec<String>,
    #[serde(default)]
    pub grade: Option<f64>,
}

impl Submission {
    fn validate(&self) -> Result<(), ScoringError> {
        if self.title.trim().is_empty() {
            return Err(ScoringError::InvalidRequest("title is required".into()));
        }
        if self.description.trim().is_empty() {
            return Err(ScoringError::InvalidRequest("description is required".into()));
        }
        if let Some(bad) = self.file_urls.iter().find(|u| Url::parse(u).is_err()) {
            return Err(ScoringError::InvalidRequest(format!("not a file URL: {bad}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub ai_score: f64,
    pub ai_suggestions: String,
    pub learning_path: String,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    #[serde(alias = "ai_score")]
    score: f64,
    #[serde(default, alias = "ai_suggestions")]
    suggestions: String,
    #[serde(default)]
    learning_path: String,
}

#[derive(Debug, Deserialize)]
struct SuggestionResponse {
    suggestion: String,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: String,
}

/// Project data sent for a whole-portfolio summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectDigest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub file_urls: Vec<String>,
}

/// Clamp a remote score into `0..=10`; non-finite values become 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() { score.clamp(0.0, MAX_SCORE) } else { 0.0 }
}

/// Mean of the graded projects, 0 when none carry a grade.
pub fn average_grade(projects: &[ProjectDigest]) -> f64 {
    let grades: Vec<f64> = projects.iter().filter_map(|p| p.grade).collect();
    if grades.is_empty() { 0.0 } else { grades.iter().sum::<f64>() / grades.len() as f64 }
}

#[derive(Clone)]
pub struct ScoringClient {
    base: Url,
    client: reqwest::Client,
}

impl ScoringClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, ScoringError> {
        // A trailing slash keeps any base path when joining endpoint names.
        let normalized = if base.ends_with('/') { base.to_string() } else { format!("{base}/") };
        let base_url = Url::parse(&normalized).map_err(|e| ScoringError::InvalidUrl(format!("{base}: {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base: base_url, client })
    }

    pub fn base_url(&self) -> &Url { &self.base }

    fn endpoint(&self, name: &str) -> Result<Url, ScoringError> {
        self.base.join(name).map_err(|e| ScoringError::InvalidUrl(e.to_string()))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ScoringError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        warn!(target: "folio::scoring", status = status.as_u16(), "scoring service error");
        Err(ScoringError::Status { status: status.as_u16(), body })
    }

    /// Score a submission: numeric score, suggestions and a learning path.
    pub async fn score(&self, submission: &Submission) -> Result<Feedback, ScoringError> {
        submission.validate()?;
        let url = self.endpoint("score")?;
        debug!(target: "folio::scoring", title = %submission.title, files = submission.file_urls.len(), "score request");
        let resp = self.client.post(url).json(submission).send().await?;
        let parsed: ScoreResponse = Self::check(resp).await?.json().await?;
        Ok(Feedback {
            ai_score: clamp_score(parsed.score),
            ai_suggestions: parsed.suggestions,
            learning_path: parsed.learning_path,
        })
    }

    /// Learning-path suggestion for a project title.
    pub async fn suggestion(&self, title: &str, description: &str, file_url: Option<&str>, grade: Option<f64>) -> Result<String, ScoringError> {
        if title.trim().is_empty() {
            return Err(ScoringError::InvalidRequest("title is required".into()));
        }
        let mut url = self.endpoint("suggestion")?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("title", title);
            if !description.is_empty() { q.append_pair("description", description); }
            if let Some(f) = file_url { q.append_pair("file_url", f); }
            if let Some(g) = grade { q.append_pair("grade", &g.to_string()); }
        }
        let resp = self.client.get(url).send().await?;
        let parsed: SuggestionResponse = Self::check(resp).await?.json().await?;
        Ok(parsed.suggestion)
    }

    /// Whole-portfolio summary over the given projects.
    pub async fn summarize(&self, projects: &[ProjectDigest]) -> Result<String, ScoringError> {
        if projects.is_empty() {
            return Err(ScoringError::InvalidRequest("no projects to summarize".into()));
        }
        let url = self.endpoint("summary")?;
        let body = serde_json::json!({
            "average_grade": average_grade(projects),
            "projects": projects,
        });
        let resp = self.client.post(url).json(&body).send().await?;
        let parsed: SummaryResponse = Self::check(resp).await?.json().await?;
        Ok(parsed.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_scores() {
        assert_eq!(clamp_score(7.5), 7.5);
        assert_eq!(clamp_score(42.0), 10.0);
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
    }

    #[test]
    fn averages_only_graded_projects() {
        let mk = |g: Option<f64>| ProjectDigest { title: "t".into(), description: "d".into(), grade: g, file_urls: vec![] };
        assert_eq!(average_grade(&[]), 0.0);
        assert_eq!(average_grade(&[mk(Some(80.0)), mk(None), mk(Some(90.0))]), 85.0);
    }

    #[test]
    fn base_path_is_kept() {
        let c = ScoringClient::new("http://ai.local:9000/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(c.endpoint("score").unwrap().as_str(), "http://ai.local:9000/v1/score");
        assert!(matches!(ScoringClient::new("not a url", Duration::from_secs(1)), Err(ScoringError::InvalidUrl(_))));
    }

    #[test]
    fn submission_validation() {
        let ok = Submission { title: "Robot".into(), description: "Line follower".into(), file_urls: vec!["https://files.example/a.pdf".into()], ..Default::default() };
        assert!(ok.validate().is_ok());
        let no_title = Submission { title: " ".into(), ..ok.clone() };
        assert!(matches!(no_title.validate(), Err(ScoringError::InvalidRequest(_))));
        let bad_url = Submission { file_urls: vec!["a.pdf".into()], ..ok };
        assert!(matches!(bad_url.validate(), Err(ScoringError::InvalidRequest(_))));
    }
}
