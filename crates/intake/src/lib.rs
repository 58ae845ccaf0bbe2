//! Intake dispatcher for push messages arriving on an ordered,
//! multi-consumer broadcast channel.
//!
//! Each inbound event flows through a single pass:
//! 1. transport filter (foreign actions and token refreshes are ignored)
//! 2. payload normalization (duplicate / competing consumer / handled flags)
//! 3. routing to one execution channel: inline, scheduled job, or fallback
//!    worker with a single retry on temporary-allowance denial
//! 4. the continue/abort consensus reported back to the shared channel

pub mod capability;
pub mod channel;
pub mod consensus;
pub mod consumers;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod normalizer;
pub mod relay;
pub mod retry;
pub mod routing;
pub mod task;

pub use {
    capability::{CapabilityTier, HostEnvironment, JOB_CAPABLE_VERSION},
    channel::{AdmissionRejected, Channels, FallbackWorker, InlineProcessor, JobAdmission, WorkerRejection},
    consensus::{ConsensusResult, ConsensusSignal, OrderedDelivery, UnorderedDelivery},
    consumers::{ConsumerId, ConsumerRegistry, InMemoryConsumerRegistry, disable_competing_consumers},
    dispatcher::{DispatchOutcome, DispatchSettings, DispatchState, Dispatcher},
    error::{Error, Result},
    event::{Priority, RawEvent},
    normalizer::{NormalizeError, PayloadNormalizer, ProcessedResult},
    relay::EventRelay,
    retry::{DEFAULT_RETRY_FLOOR, FallbackRetryPolicy},
    routing::{RoutingChoice, decide},
    task::{DeadlineHint, ScheduledJob, TaskPayload},
};
