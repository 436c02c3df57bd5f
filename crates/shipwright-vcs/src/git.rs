use std::path::Path;

use async_trait::async_trait;

use crate::runner::{CommandRunner, ExecResult, LocalCommandRunner};
use crate::truncation::truncate_output;
use crate::version_control::{CommitIdentity, VersionControl};
use shipwright_types::{redact_credentials, Secret, ShipwrightError};

const MAX_ERROR_CHARS: usize = 2_000;
const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_PUSH_TIMEOUT_MS: u64 = 120_000;

/// [`VersionControl`] backed by the `git` command-line tool.
pub struct GitCli<R = LocalCommandRunner> {
    runner: R,
    step_timeout_ms: u64,
    push_timeout_ms: u64,
}

impl GitCli<LocalCommandRunner> {
    pub fn new() -> Self {
        Self::with_runner(LocalCommandRunner::new())
    }
}

impl Default for GitCli<LocalCommandRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> GitCli<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            push_timeout_ms: DEFAULT_PUSH_TIMEOUT_MS,
        }
    }

    pub fn with_timeouts(mut self, step_timeout_ms: u64, push_timeout_ms: u64) -> Self {
        self.step_timeout_ms = step_timeout_ms;
        self.push_timeout_ms = push_timeout_ms;
        self
    }

    async fn git(
        &self,
        dir: &Path,
        step: &str,
        args: &[&str],
        timeout_ms: u64,
    ) -> shipwright_types::Result<ExecResult> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let result = self
            .runner
            .run("git", &args, dir, timeout_ms)
            .await
            .map_err(|e| step_error(step, &e.to_string()))?;

        if !result.success() {
            let detail = if result.stderr.trim().is_empty() {
                result.stdout.trim()
            } else {
                result.stderr.trim()
            };
            let message = if result.timed_out {
                detail.to_string()
            } else {
                format!("exit code {}: {}", result.exit_code, detail)
            };
            tracing::warn!(step, exit_code = result.exit_code, "git step failed");
            return Err(step_error(step, &message));
        }

        tracing::debug!(step, duration_ms = result.duration_ms, "git step completed");
        Ok(result)
    }
}

fn step_error(step: &str, message: &str) -> ShipwrightError {
    ShipwrightError::VersionControl {
        step: step.to_string(),
        message: truncate_output(&redact_credentials(message, &[]), MAX_ERROR_CHARS),
    }
}

#[async_trait]
impl<R: CommandRunner> VersionControl for GitCli<R> {
    async fn init_repo(
        &self,
        dir: &Path,
        identity: &CommitIdentity,
    ) -> shipwright_types::Result<()> {
        let t = self.step_timeout_ms;
        self.git(dir, "init", &["init"], t).await?;
        self.git(dir, "config", &["config", "user.name", &identity.name], t)
            .await?;
        self.git(dir, "config", &["config", "user.email", &identity.email], t)
            .await?;
        Ok(())
    }

    async fn commit_all(
        &self,
        dir: &Path,
        message: &str,
        branch: &str,
    ) -> shipwright_types::Result<()> {
        let t = self.step_timeout_ms;
        self.git(dir, "add", &["add", "."], t).await?;
        self.git(dir, "commit", &["commit", "-m", message], t).await?;
        self.git(dir, "branch", &["branch", "-M", branch], t).await?;
        Ok(())
    }

    async fn push(
        &self,
        dir: &Path,
        remote_url: &Secret,
        branch: &str,
    ) -> shipwright_types::Result<()> {
        self.git(
            dir,
            "remote add",
            &["remote", "add", "origin", remote_url.expose()],
            self.step_timeout_ms,
        )
        .await?;
        self.git(
            dir,
            "push",
            &["push", "-u", "origin", branch],
            self.push_timeout_ms,
        )
        .await?;
        Ok(())
    }

    async fn head_commit(&self, dir: &Path) -> shipwright_types::Result<String> {
        let result = self
            .git(dir, "rev-parse", &["rev-parse", "HEAD"], self.step_timeout_ms)
            .await?;
        let sha = result.stdout.trim().to_string();
        if sha.is_empty() {
            return Err(step_error("rev-parse", "no commit hash on stdout"));
        }
        Ok(sha)
    }
}
