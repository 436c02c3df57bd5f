//! Shared types, errors, and configuration for the shipwright pipeline.
//!
//! This crate provides the foundational types used across all other shipwright crates:
//! - `ShipwrightError`: unified error taxonomy
//! - request, bundle, publish, activation, and evaluation data model
//! - `Config`: explicit configuration built once at process start
//! - `Secret` and credential redaction for anything that may reach a log or a caller

pub mod config;
pub mod model;
pub mod secret;

pub use config::Config;
pub use model::{
    ActivationStatus, Attachment, EvaluationPayload, FileBundle, GenerationRequest,
    InvalidBundle, NotifyResult, PipelineOutcome, PublishResult, SiteActivation,
};
pub use secret::{redact_credentials, Secret};

/// Unified error type for all shipwright subsystems.
#[derive(Debug, thiserror::Error)]
pub enum ShipwrightError {
    // === Configuration / Boundary Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid secret")]
    Auth,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // === Generative Backend Errors ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
    },

    // === Publish Errors ===
    #[error("Failed to create repository (HTTP {status}): {message}")]
    RepoCreate { status: u16, message: String },

    #[error("Git {step} failed: {message}")]
    VersionControl { step: String, message: String },

    // === Workspace Errors ===
    #[error("Refusing to write bundle entry '{path}': {reason}")]
    Materialize { path: String, reason: String },

    // === Notification Errors ===
    #[error("Failed to submit evaluation after {attempts} attempts: {last_error}")]
    NotifyExhausted { attempts: usize, last_error: String },

    // === Generic ===
    #[error("HTTP request to {target} failed: {message}")]
    Http { target: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ShipwrightError {
    /// Maps the error to the HTTP status code reported at the boundary.
    ///
    /// Only caller mistakes are client errors; every pipeline failure is a
    /// server error, including failures of remote collaborators.
    pub fn http_status(&self) -> u16 {
        match self {
            ShipwrightError::Auth => 401,
            ShipwrightError::InvalidRequest(_) => 400,
            _ => 500,
        }
    }

    /// Returns `true` for configuration problems that no retry can fix.
    pub fn is_config(&self) -> bool {
        matches!(self, ShipwrightError::Config(_))
    }
}

/// A convenience alias for `Result<T, ShipwrightError>`.
pub type Result<T> = std::result::Result<T, ShipwrightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_repo_create() {
        let err = ShipwrightError::RepoCreate {
            status: 422,
            message: "name already exists on this account".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to create repository (HTTP 422): name already exists on this account"
        );
    }

    #[test]
    fn error_display_version_control() {
        let err = ShipwrightError::VersionControl {
            step: "push".into(),
            message: "remote rejected".into(),
        };
        assert_eq!(err.to_string(), "Git push failed: remote rejected");
    }

    #[test]
    fn error_display_notify_exhausted_reports_attempts() {
        let err = ShipwrightError::NotifyExhausted {
            attempts: 5,
            last_error: "Unexpected status code: 503".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to submit evaluation after 5 attempts: Unexpected status code: 503"
        );
    }

    #[test]
    fn error_display_materialize() {
        let err = ShipwrightError::Materialize {
            path: "../../etc/passwd".into(),
            reason: "path escapes the workspace".into(),
        };
        assert_eq!(
            err.to_string(),
            "Refusing to write bundle entry '../../etc/passwd': path escapes the workspace"
        );
    }

    // --- http_status ---

    #[test]
    fn http_status_auth_401() {
        assert_eq!(ShipwrightError::Auth.http_status(), 401);
    }

    #[test]
    fn http_status_invalid_request_400() {
        let err = ShipwrightError::InvalidRequest("round must be 2".into());
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn http_status_pipeline_failures_500() {
        let errs = [
            ShipwrightError::Config("missing token".into()),
            ShipwrightError::RepoCreate {
                status: 422,
                message: "exists".into(),
            },
            ShipwrightError::VersionControl {
                step: "commit".into(),
                message: "nothing to commit".into(),
            },
            ShipwrightError::NotifyExhausted {
                attempts: 5,
                last_error: "timeout".into(),
            },
        ];
        for err in errs {
            assert_eq!(err.http_status(), 500, "{err}");
        }
    }

    #[test]
    fn is_config_only_for_config_errors() {
        assert!(ShipwrightError::Config("x".into()).is_config());
        assert!(!ShipwrightError::Auth.is_config());
    }

    // --- From impls ---

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ShipwrightError = io_err.into();
        assert!(matches!(err, ShipwrightError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: ShipwrightError = json_err.into();
        assert!(matches!(err, ShipwrightError::Json(_)));
    }
}
