//! Pipeline event system for observability.
//!
//! Emits [`PipelineEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! observers (loggers, tests, a future progress UI) can follow a run without
//! coupling to the orchestrator internals.

use serde::{Deserialize, Serialize};

use crate::orchestrator::Stage;

/// Events emitted while one request moves through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    PipelineStarted {
        run_id: String,
        task: String,
        round: u8,
    },
    PipelineCompleted {
        run_id: String,
        repo_url: String,
        pages_url: String,
        duration_ms: u64,
    },
    PipelineFailed {
        run_id: String,
        stage: Stage,
        error: String,
    },
    StageStarted {
        run_id: String,
        stage: Stage,
    },
    StageCompleted {
        run_id: String,
        stage: Stage,
        duration_ms: u64,
    },
    GenerationDegraded {
        run_id: String,
        reason: String,
    },
    ActivationWarning {
        run_id: String,
        reason: String,
    },
    WorkspaceCleanupFailed {
        run_id: String,
        error: String,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<PipelineEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
