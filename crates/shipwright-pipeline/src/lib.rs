//! The submission pipeline: synthesize a static app from a brief, publish it
//! as a repository, activate static hosting, and notify the evaluator.
//!
//! [`Orchestrator`] sequences the stages; each stage sits behind a small
//! trait seam ([`HostingApi`], [`shipwright_vcs::VersionControl`],
//! [`EvaluationTransport`], [`ScratchSpace`], [`Sleeper`]) so runs can be
//! exercised without network or subprocess access.

pub mod activator;
pub mod events;
pub mod hosting;
pub mod notifier;
pub mod orchestrator;
pub mod publisher;
pub mod retry;
pub mod synthesizer;
pub mod workspace;

pub use activator::{pages_url, Activator};
pub use events::{EventEmitter, PipelineEvent};
pub use hosting::{authenticated_url, CreatedRepository, GitHubClient, HostingApi};
pub use notifier::{CallbackResponse, EvaluationTransport, HttpTransport, Notifier};
pub use orchestrator::{Orchestrator, PipelineError, PipelineParts, Stage};
pub use publisher::{generate_repo_name, Publisher, COMMIT_MESSAGE, DEFAULT_BRANCH};
pub use retry::{execute_with_retry, BackoffPolicy, Exhausted, RetryPolicy, Sleeper, TokioSleeper};
pub use synthesizer::{Synthesis, Synthesizer};
pub use workspace::{contained_path, materialize, ScratchSpace, TempScratch, Workspace};
