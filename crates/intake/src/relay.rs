use async_trait::async_trait;

use crate::event::RawEvent;

/// Re-broadcasts every inbound event, unfiltered, to proxied listeners
/// before the dispatcher looks at it.
#[async_trait]
pub trait EventRelay: Send + Sync {
    async fn relay(&self, event: &RawEvent) -> anyhow::Result<()>;
}
