//! Channel selection.
//!
//! Rules, first match wins:
//! 1. nothing remote to fetch: handle inline
//! 2. high priority: fallback worker, never subject to scheduler admission delay
//! 3. job-capable host: scheduled job
//! 4. otherwise: fallback worker

use {serde::Serialize, std::fmt};

use crate::{capability::CapabilityTier, event::Priority};

/// The execution channel an event is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingChoice {
    Immediate,
    ScheduledJob,
    FallbackWorker,
}

impl RoutingChoice {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::ScheduledJob => "scheduled_job",
            Self::FallbackWorker => "fallback_worker",
        }
    }
}

impl fmt::Display for RoutingChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn decide(
    needs_remote_resource: bool,
    priority: Priority,
    tier: CapabilityTier,
) -> RoutingChoice {
    if !needs_remote_resource {
        return RoutingChoice::Immediate;
    }
    match (priority, tier) {
        (Priority::High, _) => RoutingChoice::FallbackWorker,
        (Priority::Normal, CapabilityTier::JobCapable) => RoutingChoice::ScheduledJob,
        (Priority::Normal, CapabilityTier::Legacy) => RoutingChoice::FallbackWorker,
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        crate::{
            capability::CapabilityTier::{JobCapable, Legacy},
            event::Priority::{High, Normal},
        },
        super::RoutingChoice::{FallbackWorker, Immediate, ScheduledJob},
    };

    #[rstest]
    #[case(false, Normal, Legacy, Immediate)]
    #[case(false, Normal, JobCapable, Immediate)]
    #[case(false, High, Legacy, Immediate)]
    #[case(false, High, JobCapable, Immediate)]
    #[case(true, High, Legacy, FallbackWorker)]
    #[case(true, High, JobCapable, FallbackWorker)]
    #[case(true, Normal, JobCapable, ScheduledJob)]
    #[case(true, Normal, Legacy, FallbackWorker)]
    fn routing_table(
        #[case] needs_remote_resource: bool,
        #[case] priority: Priority,
        #[case] tier: CapabilityTier,
        #[case] expected: RoutingChoice,
    ) {
        assert_eq!(decide(needs_remote_resource, priority, tier), expected);
        // Same inputs, same answer.
        assert_eq!(decide(needs_remote_resource, priority, tier), expected);
    }

    #[test]
    fn display_matches_label() {
        assert_eq!(ScheduledJob.to_string(), "scheduled_job");
        assert_eq!(
            serde_json::to_value(FallbackWorker).unwrap_or_default(),
            "fallback_worker"
        );
    }
}
