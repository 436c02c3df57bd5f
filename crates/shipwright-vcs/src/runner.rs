use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use shipwright_types::ShipwrightError;

/// Result of executing an external command.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Abstraction over how external tools are spawned.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout_ms: u64,
    ) -> shipwright_types::Result<ExecResult>;
}

/// Runs commands as local child processes, without a shell.
#[derive(Debug, Default, Clone)]
pub struct LocalCommandRunner;

impl LocalCommandRunner {
    pub fn new() -> Self {
        Self
    }

    /// Inherited environment minus anything that looks like a credential.
    fn filtered_env() -> HashMap<String, String> {
        let exclude_suffixes: &[&str] = &[
            "_api_key",
            "_secret",
            "_token",
            "_password",
            "_credential",
        ];
        let always_include: &[&str] = &["PATH", "HOME", "USER", "LANG", "TMPDIR"];

        let mut result = HashMap::new();
        for (key, value) in std::env::vars() {
            let lower = key.to_lowercase();
            if always_include.contains(&key.as_str())
                || !exclude_suffixes.iter().any(|s| lower.ends_with(s))
            {
                result.insert(key, value);
            }
        }
        // Never block on an interactive credential prompt.
        result.insert("GIT_TERMINAL_PROMPT".into(), "0".into());
        result
    }
}

#[async_trait]
impl CommandRunner for LocalCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout_ms: u64,
    ) -> shipwright_types::Result<ExecResult> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .envs(Self::filtered_env());

        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let start = tokio::time::Instant::now();
        let mut child = cmd.spawn()?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ShipwrightError::Other(format!("{program}: stdout not captured")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShipwrightError::Other(format!("{program}: stderr not captured")))?;

        let timeout_dur = std::time::Duration::from_millis(timeout_ms);
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        // Pipes are drained while waiting; a child blocked on a full pipe never exits.
        let completed = {
            use tokio::io::AsyncReadExt;
            let collect = async {
                let (status, _, _) = tokio::join!(
                    child.wait(),
                    stdout.read_to_end(&mut stdout_buf),
                    stderr.read_to_end(&mut stderr_buf),
                );
                status
            };
            tokio::time::timeout(timeout_dur, collect).await
        };

        match completed {
            Ok(status) => {
                let status = status?;
                Ok(ExecResult {
                    stdout: String::from_utf8_lossy(&stdout_buf).to_string(),
                    stderr: String::from_utf8_lossy(&stderr_buf).to_string(),
                    exit_code: status.code().unwrap_or(-1),
                    timed_out: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Err(_) => {
                #[cfg(unix)]
                {
                    if let Some(pid) = child.id() {
                        // SIGTERM the whole process group (git spawns helpers).
                        unsafe { libc::kill(-(pid as i32), libc::SIGTERM); }
                    }
                    tokio::select! {
                        _ = child.wait() => {}
                        _ = tokio::time::sleep(std::time::Duration::from_secs(2)) => {
                            let _ = child.kill().await;
                        }
                    }
                }
                #[cfg(not(unix))]
                {
                    let _ = child.kill().await;
                }

                Ok(ExecResult {
                    stdout: String::new(),
                    stderr: format!("{program} timed out after {timeout_ms}ms"),
                    exit_code: -1,
                    timed_out: true,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
        }
    }
}
