/// Config schema types (intake dispatch, metrics).
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Consumer id this dispatcher registers under on the shared channel.
pub const DEFAULT_CONSUMER_ID: &str = "courier.intake";

/// Retry floor used when `intake.retry_floor` is unset: the first platform
/// version with a job-admission scheduler.
pub const DEFAULT_RETRY_FLOOR: u32 = 26;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CourierConfig {
    pub intake: IntakeConfig,
    pub metrics: MetricsConfig,
}

/// Intake dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntakeConfig {
    /// Abort the shared channel for every recognized payload, so no other
    /// consumer sees it. Defaults to false.
    pub filter_other_consumers: bool,
    /// Declared platform version of the host. `None` means unknown, which
    /// resolves to the legacy tier.
    pub platform_version: Option<u32>,
    /// Minimum platform version at which a worker start rejected with
    /// "temporary allowance denied" is retried. `None` uses the built-in
    /// policy floor.
    pub retry_floor: Option<u32>,
    /// Id of this consumer, excluded when listing competing consumers.
    pub consumer_id: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            filter_other_consumers: false,
            platform_version: None,
            retry_floor: None,
            consumer_id: DEFAULT_CONSUMER_ID.into(),
        }
    }
}

impl IntakeConfig {
    /// The configured retry floor, or [`DEFAULT_RETRY_FLOOR`].
    #[must_use]
    pub fn effective_retry_floor(&self) -> u32 {
        self.retry_floor.unwrap_or(DEFAULT_RETRY_FLOOR)
    }
}

/// Metrics recorder settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether metrics are recorded. Defaults to false.
    pub enabled: bool,
    /// Global labels attached to every metric.
    pub labels: HashMap<String, String>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: CourierConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, CourierConfig::default());
        assert_eq!(cfg.intake.consumer_id, DEFAULT_CONSUMER_ID);
        assert!(!cfg.intake.filter_other_consumers);
        assert!(cfg.intake.platform_version.is_none());
    }

    #[test]
    fn partial_intake_table_keeps_other_defaults() {
        let cfg: CourierConfig = toml::from_str(
            r#"
            [intake]
            filter_other_consumers = true
            platform_version = 28
            "#,
        )
        .unwrap();
        assert!(cfg.intake.filter_other_consumers);
        assert_eq!(cfg.intake.platform_version, Some(28));
        assert_eq!(cfg.intake.retry_floor, None);
        assert_eq!(cfg.intake.consumer_id, DEFAULT_CONSUMER_ID);
    }

    #[test]
    fn metrics_labels_deserialize() {
        let cfg: CourierConfig = serde_json::from_str(
            r#"{"metrics": {"enabled": true, "labels": {"host": "edge-1"}}}"#,
        )
        .unwrap();
        assert!(cfg.metrics.enabled);
        assert_eq!(cfg.metrics.labels.get("host").map(String::as_str), Some("edge-1"));
    }
}
