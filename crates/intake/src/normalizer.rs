use {async_trait::async_trait, serde::Serialize};

use crate::event::RawEvent;

/// What normalization learned about one inbound event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessedResult {
    /// The message was already seen.
    pub is_duplicate: bool,
    /// Another registered handler claims this message class.
    pub has_competing_consumer: bool,
    /// Normalization already handled the message end to end; no execution
    /// channel may run for it.
    pub fully_handled: bool,
    /// Processing must fetch remote resources before display.
    pub needs_remote_resource: bool,
    /// The payload belongs to this dispatcher's own message domain.
    pub is_domain_payload: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unrecognized payload")]
    Unrecognized,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Turns a raw delivery into typed flags and a canonical payload.
#[async_trait]
pub trait PayloadNormalizer: Send + Sync {
    /// Inspect the event. May record it for duplicate detection.
    async fn normalize(&self, event: &RawEvent) -> Result<ProcessedResult, NormalizeError>;

    /// Canonical JSON form of the event, carried in the task payload.
    async fn canonical_payload(&self, event: &RawEvent)
    -> Result<serde_json::Value, NormalizeError>;
}
