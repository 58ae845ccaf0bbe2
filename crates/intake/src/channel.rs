//! Execution channels an event can be routed to.
//!
//! Every call returns once the channel has accepted (or refused) the task;
//! none of them waits for the background work itself.

use std::sync::Arc;

use async_trait::async_trait;

use crate::task::{ScheduledJob, TaskPayload};

/// Job admission refused a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job admission rejected task {task_id}: {reason}")]
pub struct AdmissionRejected {
    pub task_id: i32,
    pub reason: String,
}

/// Why a fallback worker did not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerRejection {
    /// The host declined a short-lived elevated execution window.
    #[error("temporary execution allowance denied")]
    TemporaryAllowanceDenied,

    #[error("worker start rejected: {0}")]
    Rejected(String),
}

/// Processes a task inline on the dispatching call.
#[async_trait]
pub trait InlineProcessor: Send + Sync {
    async fn process(&self, task: &TaskPayload) -> anyhow::Result<()>;
}

/// Deferred execution through the platform's job scheduler.
#[async_trait]
pub trait JobAdmission: Send + Sync {
    async fn schedule(&self, job: ScheduledJob) -> Result<(), AdmissionRejected>;
}

/// Synchronously started background worker.
#[async_trait]
pub trait FallbackWorker: Send + Sync {
    async fn start(&self, task: &TaskPayload) -> Result<(), WorkerRejection>;
}

/// The three execution channels, shared by every dispatch.
#[derive(Clone)]
pub struct Channels {
    pub inline: Arc<dyn InlineProcessor>,
    pub jobs: Arc<dyn JobAdmission>,
    pub worker: Arc<dyn FallbackWorker>,
}

impl Channels {
    pub fn new(
        inline: Arc<dyn InlineProcessor>,
        jobs: Arc<dyn JobAdmission>,
        worker: Arc<dyn FallbackWorker>,
    ) -> Self {
        Self {
            inline,
            jobs,
            worker,
        }
    }
}
