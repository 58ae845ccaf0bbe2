//! Channel invocation with the bounded fallback-worker retry.
//!
//! A high-priority delivery can race the host's grant of a temporary
//! execution allowance, so a worker start refused with
//! [`WorkerRejection::TemporaryAllowanceDenied`] is tried once more, and
//! only on hosts at or above the retry floor. Nothing else is retried.

#[cfg(feature = "metrics")]
use courier_metrics::{counter, intake as intake_metrics};
use tracing::{debug, warn};

use crate::{
    Error, Result,
    capability::HostEnvironment,
    channel::{Channels, WorkerRejection},
    routing::RoutingChoice,
    task::{ScheduledJob, TaskPayload},
};

/// Default retry floor: the allowance race only exists on hosts that also
/// have the job scheduler.
pub const DEFAULT_RETRY_FLOOR: u32 = courier_config::DEFAULT_RETRY_FLOOR;

/// Upper bound on worker starts per event (first attempt plus one retry).
pub const MAX_WORKER_ATTEMPTS: u32 = 2;

pub struct FallbackRetryPolicy {
    channels: Channels,
    host: HostEnvironment,
    retry_floor: u32,
}

impl FallbackRetryPolicy {
    pub fn new(channels: Channels, host: HostEnvironment, retry_floor: u32) -> Self {
        Self {
            channels,
            host,
            retry_floor,
        }
    }

    /// Whether a temporary-allowance denial may be retried on this host.
    #[must_use]
    pub fn retry_allowed(&self) -> bool {
        self.host.meets(self.retry_floor)
    }

    /// Hand `task` to the channel chosen by routing.
    ///
    /// Returns [`Error::ChannelUnavailable`] when the channel refuses the
    /// task and no retry is permitted or the retry also fails.
    pub async fn invoke(&self, route: RoutingChoice, task: &TaskPayload) -> Result<()> {
        match route {
            RoutingChoice::Immediate => self
                .channels
                .inline
                .process(task)
                .await
                .map_err(|e| Error::channel_unavailable(route, 1, format!("{e:#}"))),
            RoutingChoice::ScheduledJob => {
                let job = ScheduledJob::immediate(task.clone());
                debug!(task_id = job.task_id, "submitting scheduled job");
                self.channels
                    .jobs
                    .schedule(job)
                    .await
                    .map_err(|e| Error::channel_unavailable(route, 1, e))
            },
            RoutingChoice::FallbackWorker => self.start_worker(task).await,
        }
    }

    async fn start_worker(&self, task: &TaskPayload) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.channels.worker.start(task).await {
                Ok(()) => return Ok(()),
                Err(WorkerRejection::TemporaryAllowanceDenied)
                    if attempt < MAX_WORKER_ATTEMPTS && self.retry_allowed() =>
                {
                    warn!(attempt, "worker start denied a temporary allowance, retrying");
                    #[cfg(feature = "metrics")]
                    counter!(intake_metrics::RETRIES_TOTAL).increment(1);
                    attempt += 1;
                },
                Err(rejection) => {
                    return Err(Error::channel_unavailable(
                        RoutingChoice::FallbackWorker,
                        attempt,
                        rejection,
                    ));
                },
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicU32, Ordering},
        },
    };

    use {async_trait::async_trait, rstest::rstest};

    use {
        super::*,
        crate::channel::{AdmissionRejected, FallbackWorker, InlineProcessor, JobAdmission},
    };

    struct OkInline;

    #[async_trait]
    impl InlineProcessor for OkInline {
        async fn process(&self, _task: &TaskPayload) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct RejectingJobs(AtomicU32);

    #[async_trait]
    impl JobAdmission for RejectingJobs {
        async fn schedule(&self, job: ScheduledJob) -> std::result::Result<(), AdmissionRejected> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(AdmissionRejected {
                task_id: job.task_id,
                reason: "quota".into(),
            })
        }
    }

    /// Replays scripted start results, then succeeds.
    struct ScriptedWorker {
        script: Mutex<VecDeque<WorkerRejection>>,
        calls: AtomicU32,
    }

    impl ScriptedWorker {
        fn new(script: Vec<WorkerRejection>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl FallbackWorker for ScriptedWorker {
        async fn start(&self, _task: &TaskPayload) -> std::result::Result<(), WorkerRejection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(rejection) => Err(rejection),
                None => Ok(()),
            }
        }
    }

    fn policy(
        worker: Arc<ScriptedWorker>,
        jobs: Arc<RejectingJobs>,
        platform_version: Option<u32>,
    ) -> FallbackRetryPolicy {
        FallbackRetryPolicy::new(
            Channels::new(Arc::new(OkInline), jobs, worker),
            HostEnvironment::new(platform_version),
            DEFAULT_RETRY_FLOOR,
        )
    }

    fn task() -> TaskPayload {
        TaskPayload::received_at(&serde_json::json!({}), 0)
    }

    #[test]
    fn default_floor_is_the_job_capable_version() {
        assert_eq!(DEFAULT_RETRY_FLOOR, crate::capability::JOB_CAPABLE_VERSION);
    }

    #[tokio::test]
    async fn denied_once_then_started_retries_exactly_once() {
        let worker = ScriptedWorker::new(vec![WorkerRejection::TemporaryAllowanceDenied]);
        let jobs = Arc::new(RejectingJobs(AtomicU32::new(0)));
        let policy = policy(Arc::clone(&worker), jobs, Some(28));

        policy
            .invoke(RoutingChoice::FallbackWorker, &task())
            .await
            .unwrap();
        assert_eq!(worker.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn denied_twice_is_channel_unavailable() {
        let worker = ScriptedWorker::new(vec![
            WorkerRejection::TemporaryAllowanceDenied,
            WorkerRejection::TemporaryAllowanceDenied,
        ]);
        let jobs = Arc::new(RejectingJobs(AtomicU32::new(0)));
        let policy = policy(Arc::clone(&worker), jobs, Some(28));

        let err = policy
            .invoke(RoutingChoice::FallbackWorker, &task())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ChannelUnavailable {
                route: RoutingChoice::FallbackWorker,
                attempts: 2,
                ..
            }
        ));
        assert_eq!(worker.calls.load(Ordering::SeqCst), 2);
    }

    #[rstest]
    #[case::below_floor(Some(25))]
    #[case::unknown_platform(None)]
    #[tokio::test]
    async fn no_retry_below_floor(#[case] platform_version: Option<u32>) {
        let worker = ScriptedWorker::new(vec![WorkerRejection::TemporaryAllowanceDenied]);
        let jobs = Arc::new(RejectingJobs(AtomicU32::new(0)));
        let policy = policy(Arc::clone(&worker), jobs, platform_version);

        let err = policy
            .invoke(RoutingChoice::FallbackWorker, &task())
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(worker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_rejections_are_not_retried() {
        let worker = ScriptedWorker::new(vec![WorkerRejection::Rejected("busy".into())]);
        let jobs = Arc::new(RejectingJobs(AtomicU32::new(0)));
        let policy = policy(Arc::clone(&worker), jobs, Some(30));

        let err = policy
            .invoke(RoutingChoice::FallbackWorker, &task())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("busy"));
        assert_eq!(worker.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn admission_rejection_is_not_retried() {
        let worker = ScriptedWorker::new(vec![]);
        let jobs = Arc::new(RejectingJobs(AtomicU32::new(0)));
        let policy = policy(Arc::clone(&worker), Arc::clone(&jobs), Some(30));

        let err = policy
            .invoke(RoutingChoice::ScheduledJob, &task())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ChannelUnavailable {
                route: RoutingChoice::ScheduledJob,
                attempts: 1,
                ..
            }
        ));
        assert_eq!(jobs.0.load(Ordering::SeqCst), 1);
        assert_eq!(worker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inline_runs_once() {
        let worker = ScriptedWorker::new(vec![]);
        let jobs = Arc::new(RejectingJobs(AtomicU32::new(0)));
        let policy = policy(Arc::clone(&worker), jobs, Some(30));

        policy.invoke(RoutingChoice::Immediate, &task()).await.unwrap();
        assert_eq!(worker.calls.load(Ordering::SeqCst), 0);
    }
}
