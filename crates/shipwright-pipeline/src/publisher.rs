//! Repository publishing: create the remote, commit the bundle once, push.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use shipwright_types::PublishResult;
use shipwright_vcs::{CommitIdentity, VersionControl};

use crate::hosting::HostingApi;

pub const DEFAULT_BRANCH: &str = "main";
pub const COMMIT_MESSAGE: &str = "Initial commit: Auto-generated application";

const MAX_TASK_CHARS: usize = 90;

pub struct Publisher {
    hosting: Arc<dyn HostingApi>,
    vcs: Arc<dyn VersionControl>,
}

impl Publisher {
    pub fn new(hosting: Arc<dyn HostingApi>, vcs: Arc<dyn VersionControl>) -> Self {
        Self { hosting, vcs }
    }

    /// Create `repo_name` remotely and push the contents of `bundle_dir` as a
    /// single commit on `main`.
    ///
    /// A failure after the remote exists leaves that repository behind.
    pub async fn publish(
        &self,
        bundle_dir: &Path,
        repo_name: &str,
    ) -> shipwright_types::Result<PublishResult> {
        let account = self.hosting.account()?;
        let repo = self.hosting.create_repository(repo_name).await?;
        tracing::info!(repo = %repo.html_url, owner = %repo.owner_login, "Created repository");

        let remote = self.hosting.authenticated_remote(&repo.clone_url)?;
        self.vcs
            .init_repo(bundle_dir, &CommitIdentity::noreply(&account))
            .await?;
        self.vcs
            .commit_all(bundle_dir, COMMIT_MESSAGE, DEFAULT_BRANCH)
            .await?;
        self.vcs.push(bundle_dir, &remote, DEFAULT_BRANCH).await?;
        let commit_sha = self.vcs.head_commit(bundle_dir).await?;
        tracing::info!(repo = %repo.html_url, commit = %commit_sha, "Pushed bundle");

        Ok(PublishResult {
            repo_url: repo.html_url,
            commit_sha,
            branch: DEFAULT_BRANCH.to_string(),
            owner_login: repo.owner_login,
            repo_name: repo_name.to_string(),
        })
    }
}

/// `<task>-<8 hex chars>`, with characters the hosting platform rejects
/// replaced by `-`.
pub fn generate_repo_name(task: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars =
        UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex is valid"));

    let trimmed: String = task.trim().chars().take(MAX_TASK_CHARS).collect();
    let sanitized = unsafe_chars.replace_all(&trimmed, "-");
    let base = if sanitized.is_empty() { "app" } else { sanitized.as_ref() };

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{base}-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::CreatedRepository;
    use async_trait::async_trait;
    use shipwright_types::{Secret, ShipwrightError};
    use std::sync::Mutex;

    #[test]
    fn repo_name_has_task_and_hex_suffix() {
        let name = generate_repo_name("captcha-solver");
        let (base, suffix) = name.rsplit_once('-').unwrap();
        assert_eq!(base, "captcha-solver");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn repo_name_sanitizes_task() {
        let name = generate_repo_name("my app/v2!");
        assert!(name.starts_with("my-app-v2--"), "{name}");
        assert!(generate_repo_name("   ").starts_with("app-"));
    }

    #[test]
    fn repo_names_differ_between_calls() {
        assert_ne!(generate_repo_name("t"), generate_repo_name("t"));
    }

    struct StubHosting {
        create_status: Option<u16>,
    }

    #[async_trait]
    impl HostingApi for StubHosting {
        fn account(&self) -> shipwright_types::Result<String> {
            Ok("octo".into())
        }

        async fn create_repository(&self, name: &str) -> shipwright_types::Result<CreatedRepository> {
            match self.create_status {
                Some(status) => Err(ShipwrightError::RepoCreate {
                    status,
                    message: "name already exists on this account".into(),
                }),
                None => Ok(CreatedRepository {
                    html_url: format!("https://github.com/octo/{name}"),
                    clone_url: format!("https://github.com/octo/{name}.git"),
                    owner_login: "octo".into(),
                }),
            }
        }

        fn authenticated_remote(&self, clone_url: &str) -> shipwright_types::Result<Secret> {
            Ok(Secret::new(clone_url.replace("https://", "https://tok@")))
        }

        async fn enable_pages(&self, _: &str, _: &str, _: &str) -> shipwright_types::Result<u16> {
            Ok(201)
        }
    }

    #[derive(Default)]
    struct LoggingVcs {
        steps: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VersionControl for LoggingVcs {
        async fn init_repo(&self, _: &Path, id: &CommitIdentity) -> shipwright_types::Result<()> {
            self.steps.lock().unwrap().push(format!("init {}", id.email));
            Ok(())
        }

        async fn commit_all(&self, _: &Path, msg: &str, branch: &str) -> shipwright_types::Result<()> {
            self.steps.lock().unwrap().push(format!("commit {branch} {msg}"));
            Ok(())
        }

        async fn push(&self, _: &Path, remote: &Secret, branch: &str) -> shipwright_types::Result<()> {
            self.steps
                .lock()
                .unwrap()
                .push(format!("push {} {branch}", remote.expose()));
            Ok(())
        }

        async fn head_commit(&self, _: &Path) -> shipwright_types::Result<String> {
            self.steps.lock().unwrap().push("head".into());
            Ok("abc123".into())
        }
    }

    #[tokio::test]
    async fn publish_runs_git_steps_in_order() {
        let vcs = Arc::new(LoggingVcs::default());
        let publisher = Publisher::new(
            Arc::new(StubHosting { create_status: None }),
            vcs.clone() as Arc<dyn VersionControl>,
        );

        let result = publisher
            .publish(Path::new("/tmp/bundle"), "todo-1a2b3c4d")
            .await
            .unwrap();

        assert_eq!(result.repo_url, "https://github.com/octo/todo-1a2b3c4d");
        assert_eq!(result.commit_sha, "abc123");
        assert_eq!(result.branch, "main");
        assert_eq!(result.owner_login, "octo");
        assert_eq!(
            *vcs.steps.lock().unwrap(),
            vec![
                "init octo@users.noreply.github.com".to_string(),
                format!("commit main {COMMIT_MESSAGE}"),
                "push https://tok@github.com/octo/todo-1a2b3c4d.git main".to_string(),
                "head".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn repo_create_failure_skips_git() {
        let vcs = Arc::new(LoggingVcs::default());
        let publisher = Publisher::new(
            Arc::new(StubHosting {
                create_status: Some(422),
            }),
            vcs.clone() as Arc<dyn VersionControl>,
        );

        let err = publisher
            .publish(Path::new("/tmp/bundle"), "dup")
            .await
            .unwrap_err();

        assert!(matches!(err, ShipwrightError::RepoCreate { status: 422, .. }));
        assert!(vcs.steps.lock().unwrap().is_empty());
    }
}
