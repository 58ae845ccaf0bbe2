//! The continue/abort result reported back to the shared broadcast channel.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Whether lower-ranked consumers on the ordered channel may see the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusResult {
    #[default]
    Continue,
    Abort,
}

impl ConsensusResult {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Abort => "abort",
        }
    }

    #[must_use]
    pub fn is_abort(self) -> bool {
        self == Self::Abort
    }
}

/// Handle through which a dispatch reports its consensus result.
pub trait ConsensusSignal: Send + Sync {
    /// Whether the delivery belongs to an ordered consensus sequence.
    fn is_ordered(&self) -> bool;

    /// Record the result. Only called for ordered deliveries.
    fn set_result(&self, result: ConsensusResult);
}

/// Publish `result` if the delivery is ordered. A no-op otherwise.
pub fn publish(signal: &dyn ConsensusSignal, result: ConsensusResult) {
    if signal.is_ordered() {
        signal.set_result(result);
    }
}

/// An ordered delivery. Keeps the last published result for the caller.
#[derive(Debug, Default)]
pub struct OrderedDelivery {
    result: Mutex<Option<ConsensusResult>>,
}

impl OrderedDelivery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The published result, `None` if nothing was signaled yet.
    #[must_use]
    pub fn result(&self) -> Option<ConsensusResult> {
        *self.result.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConsensusSignal for OrderedDelivery {
    fn is_ordered(&self) -> bool {
        true
    }

    fn set_result(&self, result: ConsensusResult) {
        *self.result.lock().unwrap_or_else(|e| e.into_inner()) = Some(result);
    }
}

/// A plain, unordered delivery. There is nobody to report a result to.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnorderedDelivery;

impl ConsensusSignal for UnorderedDelivery {
    fn is_ordered(&self) -> bool {
        false
    }

    fn set_result(&self, _result: ConsensusResult) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_delivery_keeps_last_result() {
        let delivery = OrderedDelivery::new();
        assert_eq!(delivery.result(), None);

        publish(&delivery, ConsensusResult::Continue);
        publish(&delivery, ConsensusResult::Abort);
        assert_eq!(delivery.result(), Some(ConsensusResult::Abort));
    }

    #[test]
    fn unordered_publish_is_silent() {
        publish(&UnorderedDelivery, ConsensusResult::Abort);
        UnorderedDelivery.set_result(ConsensusResult::Continue);
        assert!(!UnorderedDelivery.is_ordered());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ConsensusResult::Abort).ok().as_deref(),
            Some("\"abort\"")
        );
        assert!(ConsensusResult::Abort.is_abort());
        assert_eq!(ConsensusResult::default(), ConsensusResult::Continue);
    }
}
