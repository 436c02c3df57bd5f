//! Process configuration, built once at startup and handed to the orchestrator.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Secret, ShipwrightError};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_PAGES_SETTLE: Duration = Duration::from_secs(5);
/// Upper bound on one generative-backend or hosting API request, connect included.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything the pipeline needs from the environment.
///
/// Credentials are optional here: a missing one only fails the stage that
/// needs it (as a [`ShipwrightError::Config`]), and a missing generative
/// backend key simply means every run uses the fallback bundle.
#[derive(Debug, Clone)]
pub struct Config {
    pub shared_secret: Option<Secret>,
    pub github_token: Option<Secret>,
    pub github_username: Option<String>,
    /// Organization to create repositories under instead of the user account.
    pub github_org: Option<String>,
    pub github_api_url: String,
    pub openai_api_key: Option<Secret>,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Parent directory for scratch workspaces; system temp dir when unset.
    pub workspace_dir: Option<PathBuf>,
    pub pages_settle_delay: Duration,
    /// Total time allowed for each outbound backend or hosting request.
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shared_secret: None,
            github_token: None,
            github_username: None,
            github_org: None,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            workspace_dir: None,
            pages_settle_delay: DEFAULT_PAGES_SETTLE,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl Config {
    /// The hosting credential and account name, or a configuration error.
    pub fn github_credentials(&self) -> crate::Result<(&Secret, &str)> {
        match (&self.github_token, self.github_username.as_deref()) {
            (Some(token), Some(user)) if !token.is_empty() && !user.is_empty() => {
                Ok((token, user))
            }
            _ => Err(ShipwrightError::Config(
                "GitHub credentials not configured".into(),
            )),
        }
    }

    /// Raw secret values, for redacting them out of messages.
    pub fn secret_values(&self) -> Vec<&str> {
        [
            self.shared_secret.as_ref(),
            self.github_token.as_ref(),
            self.openai_api_key.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(Secret::expose)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_public_apis() {
        let config = Config::default();
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert_eq!(config.openai_model, "gpt-4");
        assert_eq!(config.pages_settle_delay, Duration::from_secs(5));
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn github_credentials_require_token_and_user() {
        let mut config = Config::default();
        assert!(config.github_credentials().unwrap_err().is_config());

        config.github_token = Some(Secret::new("ghp_token"));
        assert!(config.github_credentials().is_err());

        config.github_username = Some("octo".into());
        let (token, user) = config.github_credentials().unwrap();
        assert_eq!(token.expose(), "ghp_token");
        assert_eq!(user, "octo");
    }

    #[test]
    fn empty_token_counts_as_missing() {
        let config = Config {
            github_token: Some(Secret::new("")),
            github_username: Some("octo".into()),
            ..Config::default()
        };
        assert!(config.github_credentials().is_err());
    }

    #[test]
    fn secret_values_lists_configured_credentials() {
        let config = Config {
            shared_secret: Some(Secret::new("s3cret")),
            github_token: Some(Secret::new("ghp_token")),
            ..Config::default()
        };
        assert_eq!(config.secret_values(), vec!["s3cret", "ghp_token"]);
    }
}
