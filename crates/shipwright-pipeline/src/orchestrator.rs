//! Pipeline orchestrator: drives one request through every stage.
//!
//! Stages run strictly in order:
//! `Synthesizing -> Materializing -> Publishing -> Activating -> Notifying -> Done`.
//! A failure in any stage ends the run as [`PipelineError`] carrying that stage.
//! The scratch workspace is removed on every exit path once it exists,
//! including a run whose future is dropped mid-stage.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use shipwright_types::{
    Config, EvaluationPayload, FileBundle, GenerationRequest, PipelineOutcome, ShipwrightError,
};
use shipwright_vcs::{GitCli, VersionControl};

use crate::activator::Activator;
use crate::events::{EventEmitter, PipelineEvent};
use crate::hosting::{GitHubClient, HostingApi};
use crate::notifier::{EvaluationTransport, HttpTransport, Notifier};
use crate::publisher::{generate_repo_name, Publisher};
use crate::retry::{Sleeper, TokioSleeper};
use crate::synthesizer::Synthesizer;
use crate::workspace::{materialize, ScratchSpace, TempScratch, Workspace};

// ---------------------------------------------------------------------------
// Stage / PipelineError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Synthesizing,
    Materializing,
    Publishing,
    Activating,
    Notifying,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Synthesizing => "synthesizing",
            Stage::Materializing => "materializing",
            Stage::Publishing => "publishing",
            Stage::Activating => "activating",
            Stage::Notifying => "notifying",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a run: the stage it happened in and why.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: ShipwrightError,
}

impl PipelineError {
    pub fn http_status(&self) -> u16 {
        self.source.http_status()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Collaborators an [`Orchestrator`] is assembled from.
pub struct PipelineParts {
    pub synthesizer: Synthesizer,
    pub hosting: Arc<dyn HostingApi>,
    pub vcs: Arc<dyn VersionControl>,
    pub transport: Arc<dyn EvaluationTransport>,
    pub scratch: Arc<dyn ScratchSpace>,
    pub sleeper: Arc<dyn Sleeper>,
    pub settle_delay: Duration,
}

/// Shared across requests; holds no per-request state.
pub struct Orchestrator {
    synthesizer: Synthesizer,
    publisher: Publisher,
    activator: Activator,
    notifier: Notifier,
    scratch: Arc<dyn ScratchSpace>,
    events: EventEmitter,
}

impl Orchestrator {
    /// Production wiring: OpenAI (when keyed), GitHub, the git CLI, and HTTP callbacks.
    pub fn from_config(config: &Config) -> Self {
        let scratch = match &config.workspace_dir {
            Some(dir) => TempScratch::new(dir),
            None => TempScratch::system(),
        };
        Self::from_parts(PipelineParts {
            synthesizer: Synthesizer::from_config(config),
            hosting: Arc::new(GitHubClient::from_config(config)),
            vcs: Arc::new(GitCli::new()),
            transport: Arc::new(HttpTransport::new()),
            scratch: Arc::new(scratch),
            sleeper: Arc::new(TokioSleeper),
            settle_delay: config.pages_settle_delay,
        })
    }

    pub fn from_parts(parts: PipelineParts) -> Self {
        Self {
            synthesizer: parts.synthesizer,
            publisher: Publisher::new(parts.hosting.clone(), parts.vcs),
            activator: Activator::new(parts.hosting, parts.sleeper.clone(), parts.settle_delay),
            notifier: Notifier::new(parts.transport, parts.sleeper),
            scratch: parts.scratch,
            events: EventEmitter::default(),
        }
    }

    /// Subscribe here to observe runs.
    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    /// Run the whole pipeline for one request.
    pub async fn run(&self, request: &GenerationRequest) -> Result<PipelineOutcome, PipelineError> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let started = Instant::now();
        tracing::info!(
            run_id = %run_id,
            task = %request.task,
            round = request.round,
            nonce = %request.nonce,
            "Pipeline started"
        );
        self.events.emit(PipelineEvent::PipelineStarted {
            run_id: run_id.clone(),
            task: request.task.clone(),
            round: request.round,
        });

        let synthesis = self
            .stage(&run_id, Stage::Synthesizing, async {
                Ok(self
                    .synthesizer
                    .synthesize_detailed(
                        &request.brief,
                        &request.attachments,
                        &request.checks,
                        request.is_update(),
                    )
                    .await)
            })
            .await?;
        if let Some(reason) = &synthesis.degraded {
            self.events.emit(PipelineEvent::GenerationDegraded {
                run_id: run_id.clone(),
                reason: reason.clone(),
            });
        }

        // Dropping `workspace` unreleased (run cancelled) discards it.
        let workspace = Workspace::acquire(self.scratch.clone())
            .await
            .map_err(|source| self.failed(&run_id, Stage::Materializing, source))?;
        let result = self
            .deliver(&run_id, request, &synthesis.bundle, workspace.path())
            .await;
        self.release(&run_id, workspace).await;
        let outcome = result?;

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %run_id,
            stage = %Stage::Done,
            repo = %outcome.repo_url,
            pages = %outcome.pages_url,
            duration_ms,
            "Pipeline completed"
        );
        self.events.emit(PipelineEvent::PipelineCompleted {
            run_id,
            repo_url: outcome.repo_url.clone(),
            pages_url: outcome.pages_url.clone(),
            duration_ms,
        });
        Ok(outcome)
    }

    /// Every stage after the workspace exists.
    async fn deliver(
        &self,
        run_id: &str,
        request: &GenerationRequest,
        bundle: &FileBundle,
        workspace: &Path,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.stage(run_id, Stage::Materializing, materialize(workspace, bundle))
            .await?;

        let repo_name = generate_repo_name(&request.task);
        let published = self
            .stage(
                run_id,
                Stage::Publishing,
                self.publisher.publish(workspace, &repo_name),
            )
            .await?;

        let site = self
            .stage(
                run_id,
                Stage::Activating,
                self.activator
                    .activate(&published.repo_name, &published.owner_login),
            )
            .await?;
        if let shipwright_types::ActivationStatus::FailedNonFatally { reason } = &site.status {
            self.events.emit(PipelineEvent::ActivationWarning {
                run_id: run_id.to_string(),
                reason: reason.clone(),
            });
        }

        let payload = EvaluationPayload {
            email: request.email.clone(),
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            repo_url: published.repo_url.clone(),
            commit_sha: published.commit_sha.clone(),
            pages_url: site.pages_url.clone(),
        };
        let notified = self
            .stage(
                run_id,
                Stage::Notifying,
                self.notifier.notify(&payload, &request.evaluation_url),
            )
            .await;
        if notified.is_err() {
            tracing::warn!(
                run_id = %run_id,
                repo = %published.repo_url,
                "Repository stays published although the evaluator was not notified"
            );
        }
        notified?;

        Ok(PipelineOutcome {
            repo_url: published.repo_url,
            commit_sha: published.commit_sha,
            pages_url: site.pages_url,
            evaluation_submitted: true,
        })
    }

    async fn stage<T, F>(&self, run_id: &str, stage: Stage, work: F) -> Result<T, PipelineError>
    where
        F: Future<Output = shipwright_types::Result<T>>,
    {
        tracing::info!(run_id = %run_id, stage = %stage, "Stage started");
        self.events.emit(PipelineEvent::StageStarted {
            run_id: run_id.to_string(),
            stage,
        });
        let started = Instant::now();

        match work.await {
            Ok(value) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                tracing::debug!(run_id = %run_id, stage = %stage, duration_ms, "Stage completed");
                self.events.emit(PipelineEvent::StageCompleted {
                    run_id: run_id.to_string(),
                    stage,
                    duration_ms,
                });
                Ok(value)
            }
            Err(source) => Err(self.failed(run_id, stage, source)),
        }
    }

    fn failed(&self, run_id: &str, stage: Stage, source: ShipwrightError) -> PipelineError {
        tracing::error!(run_id = %run_id, stage = %stage, error = %source, "Stage failed");
        self.events.emit(PipelineEvent::PipelineFailed {
            run_id: run_id.to_string(),
            stage,
            error: source.to_string(),
        });
        PipelineError { stage, source }
    }

    async fn release(&self, run_id: &str, workspace: Workspace) {
        let path = workspace.path().to_path_buf();
        if let Err(e) = workspace.release().await {
            tracing::warn!(
                run_id = %run_id,
                path = %path.display(),
                error = %e,
                "Failed to remove scratch workspace"
            );
            self.events.emit(PipelineEvent::WorkspaceCleanupFailed {
                run_id: run_id.to_string(),
                error: e.to_string(),
            });
        }
    }
}
