//! Wire types for the HTTP API and their validation.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use shipwright_types::{Attachment, GenerationRequest, PipelineOutcome};

/// Body of `POST /api` and `POST /api/update`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppRequest {
    pub email: String,
    pub secret: String,
    pub task: String,
    pub round: i64,
    pub nonce: String,
    pub brief: String,
    pub checks: Vec<String>,
    pub evaluation_url: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl AppRequest {
    /// Field-level checks that do not depend on the round.
    pub fn validate(&self) -> Result<(), String> {
        check_email(&self.email)?;
        check_http_url("evaluation_url", &self.evaluation_url)
    }

    /// Strip the secret and narrow the round. Call after round gating.
    pub fn into_generation_request(self) -> Result<GenerationRequest, String> {
        let round = u8::try_from(self.round)
            .map_err(|_| format!("round {} is out of range", self.round))?;
        Ok(GenerationRequest {
            email: self.email,
            task: self.task,
            round,
            nonce: self.nonce,
            brief: self.brief,
            checks: self.checks,
            evaluation_url: self.evaluation_url,
            attachments: self.attachments,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppResponse {
    pub status: String,
    pub message: String,
    pub task: String,
    pub round: u8,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
    pub evaluation_submitted: bool,
}

impl AppResponse {
    pub fn success(message: &str, request: &GenerationRequest, outcome: PipelineOutcome) -> Self {
        Self {
            status: "success".into(),
            message: message.into(),
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            repo_url: outcome.repo_url,
            commit_sha: outcome.commit_sha,
            pages_url: outcome.pages_url,
            evaluation_submitted: outcome.evaluation_submitted,
        }
    }
}

/// Body of `POST /evaluation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub email: String,
    pub task: String,
    pub round: i64,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

impl EvaluationRequest {
    pub fn validate(&self) -> Result<(), String> {
        check_email(&self.email)?;
        check_http_url("repo_url", &self.repo_url)?;
        check_http_url("pages_url", &self.pages_url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub status: String,
    pub message: String,
    pub task: String,
    pub round: i64,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

fn check_email(email: &str) -> Result<(), String> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let pattern = EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("static regex is valid")
    });
    if pattern.is_match(email) {
        Ok(())
    } else {
        Err("email: value is not a valid email address".into())
    }
}

fn check_http_url(field: &str, url: &str) -> Result<(), String> {
    static URL: OnceLock<Regex> = OnceLock::new();
    let pattern = URL.get_or_init(|| {
        Regex::new(r"^(?i)https?://[^\s/?#@]+(@[^\s/?#@]+)?([/?#]\S*)?$")
            .expect("static regex is valid")
    });
    if pattern.is_match(url) {
        Ok(())
    } else {
        Err(format!("{field}: input should be a valid http(s) URL"))
    }
}
