//! Metric name and label definitions.
//!
//! All metric names used by the intake dispatcher live here so the set of
//! exported series is documented in one place.

/// Intake dispatcher metrics
pub mod intake {
    /// Total inbound events seen, labeled by final `state`
    pub const EVENTS_TOTAL: &str = "courier_intake_events_total";
    /// Events handed to an execution channel, labeled by `route`
    pub const ROUTED_TOTAL: &str = "courier_intake_routed_total";
    /// Events for which the shared channel was told to abort
    pub const ABORTED_TOTAL: &str = "courier_intake_aborted_total";
    /// Worker starts retried after a temporary-allowance denial
    pub const RETRIES_TOTAL: &str = "courier_intake_retries_total";
    /// Channel invocations that failed after exhausting retry, labeled by `route`
    pub const CHANNEL_UNAVAILABLE_TOTAL: &str = "courier_intake_channel_unavailable_total";
    /// Events whose payload failed to normalize
    pub const NORMALIZATION_FAILURES_TOTAL: &str = "courier_intake_normalization_failures_total";
    /// Wall time of one dispatch call in seconds
    pub const DISPATCH_DURATION_SECONDS: &str = "courier_intake_dispatch_duration_seconds";
}

/// Common label keys
pub mod labels {
    pub const STATE: &str = "state";
    pub const ROUTE: &str = "route";
}

/// Histogram bucket definitions
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Dispatch duration buckets (in seconds).
    /// Covers 100µs to 5s; dispatch only waits for admission or worker start.
    pub static DISPATCH_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0, 5.0,
        ]
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intake_names_share_prefix() {
        for name in [
            intake::EVENTS_TOTAL,
            intake::ROUTED_TOTAL,
            intake::ABORTED_TOTAL,
            intake::RETRIES_TOTAL,
            intake::CHANNEL_UNAVAILABLE_TOTAL,
            intake::NORMALIZATION_FAILURES_TOTAL,
            intake::DISPATCH_DURATION_SECONDS,
        ] {
            assert!(name.starts_with("courier_intake_"), "{name}");
        }
    }

    #[test]
    fn dispatch_buckets_are_sorted() {
        let b = &*buckets::DISPATCH_DURATION;
        assert!(b.windows(2).all(|w| w[0] < w[1]));
    }
}
