//! Best-effort static-site activation.

use std::sync::Arc;
use std::time::Duration;

use shipwright_types::{ActivationStatus, SiteActivation};

use crate::hosting::HostingApi;
use crate::publisher::DEFAULT_BRANCH;
use crate::retry::Sleeper;

pub struct Activator {
    hosting: Arc<dyn HostingApi>,
    sleeper: Arc<dyn Sleeper>,
    settle_delay: Duration,
}

impl Activator {
    pub fn new(
        hosting: Arc<dyn HostingApi>,
        sleeper: Arc<dyn Sleeper>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            hosting,
            sleeper,
            settle_delay,
        }
    }

    /// Enable hosting for `main` and wait out the settle delay.
    ///
    /// Rejections by the hosting platform are reported in the returned status;
    /// only configuration errors propagate.
    pub async fn activate(
        &self,
        repo_name: &str,
        owner_login: &str,
    ) -> shipwright_types::Result<SiteActivation> {
        let status = match self
            .hosting
            .enable_pages(owner_login, repo_name, DEFAULT_BRANCH)
            .await
        {
            Ok(200 | 201) => ActivationStatus::NewlyEnabled,
            Ok(409) => ActivationStatus::AlreadyEnabled,
            Ok(code) => ActivationStatus::FailedNonFatally {
                reason: format!("pages request returned HTTP {code}"),
            },
            Err(e) if e.is_config() => return Err(e),
            Err(e) => ActivationStatus::FailedNonFatally {
                reason: e.to_string(),
            },
        };

        if let ActivationStatus::FailedNonFatally { reason } = &status {
            tracing::warn!(repo = %repo_name, reason = %reason, "Pages activation not confirmed");
        } else {
            tracing::info!(repo = %repo_name, status = ?status, "Pages enabled");
        }

        self.sleeper.sleep(self.settle_delay).await;

        Ok(SiteActivation {
            pages_url: pages_url(owner_login, repo_name),
            status,
        })
    }
}

pub fn pages_url(owner_login: &str, repo_name: &str) -> String {
    format!("https://{owner_login}.github.io/{repo_name}/")
}
