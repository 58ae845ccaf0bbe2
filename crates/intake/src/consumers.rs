//! Other consumers registered for the receive action on the same host.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Mutex,
};

use {
    anyhow::{Result, bail},
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tracing::{info, warn},
};

/// Identifier of a consumer on the shared broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerId(String);

impl ConsumerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConsumerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Administrative view of the consumers sharing the receive action.
#[async_trait]
pub trait ConsumerRegistry: Send + Sync {
    /// Enabled consumers other than this dispatcher.
    async fn list_competing_consumers(&self) -> Result<BTreeSet<ConsumerId>>;

    /// Stop `id` from receiving further deliveries.
    async fn disable(&self, id: &ConsumerId) -> Result<()>;
}

/// Disable every competing consumer, skipping `self_id`. Returns how many
/// were disabled. Stops at the first failure.
pub async fn disable_competing_consumers(
    registry: &dyn ConsumerRegistry,
    self_id: &ConsumerId,
) -> Result<usize> {
    let mut disabled = 0;
    for id in registry.list_competing_consumers().await? {
        if &id == self_id {
            continue;
        }
        registry.disable(&id).await?;
        info!(consumer = %id, "disabled competing consumer");
        disabled += 1;
    }
    Ok(disabled)
}

/// Registry kept in memory, keyed by consumer id with an enabled flag.
pub struct InMemoryConsumerRegistry {
    self_id: ConsumerId,
    consumers: Mutex<BTreeMap<ConsumerId, bool>>,
}

impl InMemoryConsumerRegistry {
    pub fn new(self_id: ConsumerId) -> Self {
        Self {
            self_id,
            consumers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register an enabled consumer. Re-registering re-enables it.
    pub fn register(&self, id: ConsumerId) {
        let mut consumers = self.consumers.lock().unwrap_or_else(|e| e.into_inner());
        consumers.insert(id, true);
    }

    #[must_use]
    pub fn is_enabled(&self, id: &ConsumerId) -> bool {
        let consumers = self.consumers.lock().unwrap_or_else(|e| e.into_inner());
        consumers.get(id).copied().unwrap_or(false)
    }
}

#[async_trait]
impl ConsumerRegistry for InMemoryConsumerRegistry {
    async fn list_competing_consumers(&self) -> Result<BTreeSet<ConsumerId>> {
        let consumers = self.consumers.lock().unwrap_or_else(|e| e.into_inner());
        Ok(consumers
            .iter()
            .filter(|(id, enabled)| **enabled && **id != self.self_id)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn disable(&self, id: &ConsumerId) -> Result<()> {
        if *id == self.self_id {
            warn!(consumer = %id, "refusing to disable this dispatcher");
            bail!("cannot disable own consumer: {id}");
        }
        let mut consumers = self.consumers.lock().unwrap_or_else(|e| e.into_inner());
        match consumers.get_mut(id) {
            Some(enabled) => {
                *enabled = false;
                Ok(())
            },
            None => bail!("consumer not found: {id}"),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InMemoryConsumerRegistry {
        let registry = InMemoryConsumerRegistry::new("courier.intake".into());
        registry.register("courier.intake".into());
        registry.register("extender.a".into());
        registry.register("extender.b".into());
        registry
    }

    #[tokio::test]
    async fn lists_others_only() {
        let listed = registry().list_competing_consumers().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(ConsumerId::as_str).collect();
        assert_eq!(ids, ["extender.a", "extender.b"]);
    }

    #[tokio::test]
    async fn disable_all_competitors() {
        let registry = registry();
        let count = disable_competing_consumers(&registry, &"courier.intake".into())
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert!(registry.list_competing_consumers().await.unwrap().is_empty());
        assert!(registry.is_enabled(&"courier.intake".into()));
        assert!(!registry.is_enabled(&"extender.a".into()));
    }

    #[tokio::test]
    async fn disable_unknown_or_self_fails() {
        let registry = registry();
        assert!(registry.disable(&"missing".into()).await.is_err());
        assert!(registry.disable(&"courier.intake".into()).await.is_err());
    }

    #[tokio::test]
    async fn nothing_to_disable() {
        let registry = InMemoryConsumerRegistry::new("courier.intake".into());
        let count = disable_competing_consumers(&registry, &"courier.intake".into())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
