//! Per-event orchestration: filter, normalize, route, signal.

use std::sync::Arc;

#[cfg(feature = "metrics")]
use courier_metrics::{counter, histogram, intake as intake_metrics, labels};
use {
    courier_config::IntakeConfig,
    serde::Serialize,
    tracing::{debug, warn},
};

use crate::{
    Result,
    capability::HostEnvironment,
    channel::Channels,
    consensus::{ConsensusResult, ConsensusSignal, publish},
    consumers::ConsumerRegistry,
    event::RawEvent,
    normalizer::{NormalizeError, PayloadNormalizer, ProcessedResult},
    relay::EventRelay,
    retry::{DEFAULT_RETRY_FLOOR, FallbackRetryPolicy},
    routing::{RoutingChoice, decide},
    task::TaskPayload,
};

/// Dispatcher knobs fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Abort the shared channel for payloads of our own domain.
    pub filter_other_consumers: bool,
    /// Lowest platform version on which a denied worker start is retried.
    pub retry_floor: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            filter_other_consumers: false,
            retry_floor: DEFAULT_RETRY_FLOOR,
        }
    }
}

impl From<&IntakeConfig> for DispatchSettings {
    fn from(config: &IntakeConfig) -> Self {
        Self {
            filter_other_consumers: config.filter_other_consumers,
            retry_floor: config.effective_retry_floor(),
        }
    }
}

/// Where a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Not a transport message; nothing was processed.
    Ignored,
    /// The payload could not be normalized.
    NormalizationFailed,
    /// Normalization handled the message itself; no channel ran.
    ShortCircuited,
    /// Handed to an execution channel.
    Routed,
}

impl DispatchState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::NormalizationFailed => "normalization_failed",
            Self::ShortCircuited => "short_circuited",
            Self::Routed => "routed",
        }
    }
}

/// Summary of one successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub state: DispatchState,
    /// Set only when a channel was invoked.
    pub route: Option<RoutingChoice>,
    pub consensus: ConsensusResult,
}

/// Consensus for a normalized event.
#[must_use]
pub fn consensus_for(processed: &ProcessedResult, filter_other_consumers: bool) -> ConsensusResult {
    if processed.is_duplicate
        || processed.has_competing_consumer
        || (processed.is_domain_payload && filter_other_consumers)
    {
        ConsensusResult::Abort
    } else {
        ConsensusResult::Continue
    }
}

/// Intake dispatcher. Holds no per-event state and can be shared across
/// tasks behind an `Arc`.
pub struct Dispatcher {
    settings: DispatchSettings,
    host: HostEnvironment,
    normalizer: Arc<dyn PayloadNormalizer>,
    policy: FallbackRetryPolicy,
    registry: Option<Arc<dyn ConsumerRegistry>>,
    relay: Option<Arc<dyn EventRelay>>,
}

impl Dispatcher {
    pub fn new(
        settings: DispatchSettings,
        host: HostEnvironment,
        normalizer: Arc<dyn PayloadNormalizer>,
        channels: Channels,
    ) -> Self {
        Self {
            settings,
            host,
            normalizer,
            policy: FallbackRetryPolicy::new(channels, host, settings.retry_floor),
            registry: None,
            relay: None,
        }
    }

    /// Consult `registry` for competing consumers on every normalized event.
    #[must_use]
    pub fn with_consumer_registry(mut self, registry: Arc<dyn ConsumerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Forward every raw event to `relay` before processing it.
    #[must_use]
    pub fn with_relay(mut self, relay: Arc<dyn EventRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Run one inbound event through the intake pipeline.
    ///
    /// The consensus result is published through `signal` on every path.
    /// Once normalization has produced flags, the published result follows
    /// them even when the canonical payload or the channel invocation fails;
    /// a channel failure is returned after publishing.
    pub async fn dispatch(
        &self,
        event: &RawEvent,
        signal: &dyn ConsensusSignal,
    ) -> Result<DispatchOutcome> {
        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();

        let result = self.run(event, signal).await;

        #[cfg(feature = "metrics")]
        {
            let state = match &result {
                Ok(outcome) => outcome.state.as_str(),
                Err(_) => "channel_unavailable",
            };
            counter!(intake_metrics::EVENTS_TOTAL, labels::STATE => state).increment(1);
            histogram!(intake_metrics::DISPATCH_DURATION_SECONDS)
                .record(start.elapsed().as_secs_f64());
        }

        result
    }

    async fn run(&self, event: &RawEvent, signal: &dyn ConsensusSignal) -> Result<DispatchOutcome> {
        if let Some(relay) = &self.relay
            && let Err(e) = relay.relay(event).await
        {
            warn!(error = %e, "event relay failed");
        }

        if event.attributes.is_none() || event.is_token_refresh() || !event.is_transport_message() {
            debug!(action = %event.action, "ignoring non-message delivery");
            return Ok(self.finish(signal, DispatchState::Ignored, None, ConsensusResult::Continue));
        }

        let mut processed = match self.normalizer.normalize(event).await {
            Ok(processed) => processed,
            Err(e) => {
                return Ok(self.normalization_failed(signal, &e, ConsensusResult::Continue));
            },
        };
        if self.has_competitors().await {
            processed.has_competing_consumer = true;
        }
        let consensus = consensus_for(&processed, self.settings.filter_other_consumers);

        if processed.fully_handled {
            debug!(?processed, "event fully handled during normalization");
            return Ok(self.finish(signal, DispatchState::ShortCircuited, None, consensus));
        }

        let canonical = match self.normalizer.canonical_payload(event).await {
            Ok(canonical) => canonical,
            Err(e) => return Ok(self.normalization_failed(signal, &e, consensus)),
        };
        let task = TaskPayload::received_now(&canonical);
        let priority = event.priority();
        let route = decide(processed.needs_remote_resource, priority, self.host.tier());
        debug!(%route, ?priority, tier = ?self.host.tier(), "routing event");

        if let Err(e) = self.policy.invoke(route, &task).await {
            warn!(%route, attempts = e.attempts(), error = %e, "dropping event");
            #[cfg(feature = "metrics")]
            counter!(
                intake_metrics::CHANNEL_UNAVAILABLE_TOTAL,
                labels::ROUTE => route.as_str()
            )
            .increment(1);
            signal_consensus(signal, consensus);
            return Err(e);
        }

        #[cfg(feature = "metrics")]
        counter!(intake_metrics::ROUTED_TOTAL, labels::ROUTE => route.as_str()).increment(1);

        Ok(self.finish(signal, DispatchState::Routed, Some(route), consensus))
    }

    /// Whether an attached registry reports other enabled consumers. Registry
    /// errors count as none.
    async fn has_competitors(&self) -> bool {
        let Some(registry) = &self.registry else {
            return false;
        };
        match registry.list_competing_consumers().await {
            Ok(consumers) => !consumers.is_empty(),
            Err(e) => {
                warn!(error = %e, "consumer registry lookup failed");
                false
            },
        }
    }

    fn normalization_failed(
        &self,
        signal: &dyn ConsensusSignal,
        error: &NormalizeError,
        consensus: ConsensusResult,
    ) -> DispatchOutcome {
        warn!(error = %error, "payload normalization failed");
        #[cfg(feature = "metrics")]
        counter!(intake_metrics::NORMALIZATION_FAILURES_TOTAL).increment(1);
        self.finish(signal, DispatchState::NormalizationFailed, None, consensus)
    }

    fn finish(
        &self,
        signal: &dyn ConsensusSignal,
        state: DispatchState,
        route: Option<RoutingChoice>,
        consensus: ConsensusResult,
    ) -> DispatchOutcome {
        signal_consensus(signal, consensus);
        debug!(
            state = state.as_str(),
            consensus = consensus.as_str(),
            ordered = signal.is_ordered(),
            "dispatch finished"
        );
        DispatchOutcome {
            state,
            route,
            consensus,
        }
    }
}

fn signal_consensus(signal: &dyn ConsensusSignal, consensus: ConsensusResult) {
    publish(signal, consensus);
    #[cfg(feature = "metrics")]
    if consensus.is_abort() && signal.is_ordered() {
        counter!(intake_metrics::ABORTED_TOTAL).increment(1);
    }
}
