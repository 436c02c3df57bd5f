use std::path::Path;

use async_trait::async_trait;
use shipwright_types::Secret;

/// Author identity recorded on the single publish commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    /// Identity using the account's GitHub noreply address.
    pub fn noreply(username: &str) -> Self {
        Self {
            name: username.to_string(),
            email: format!("{username}@users.noreply.github.com"),
        }
    }
}

/// The version-control steps a publish needs, in the order it calls them.
///
/// Every method fails with [`shipwright_types::ShipwrightError::VersionControl`]
/// naming the failed step; messages never contain the remote credential.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Create a fresh repository in `dir` and configure the author identity.
    async fn init_repo(&self, dir: &Path, identity: &CommitIdentity)
        -> shipwright_types::Result<()>;

    /// Stage everything, create one commit, and name the branch `branch`.
    async fn commit_all(
        &self,
        dir: &Path,
        message: &str,
        branch: &str,
    ) -> shipwright_types::Result<()>;

    /// Add `remote_url` (which may embed a credential) as `origin` and push `branch`.
    async fn push(&self, dir: &Path, remote_url: &Secret, branch: &str)
        -> shipwright_types::Result<()>;

    /// Hash of the current `HEAD` commit.
    async fn head_commit(&self, dir: &Path) -> shipwright_types::Result<String>;
}
