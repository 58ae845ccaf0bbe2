//! Raw inbound events and the transport markers used to filter them.

use std::collections::HashMap;

use bytes::Bytes;

/// Action carried by every push delivery this dispatcher handles.
pub const RECEIVE_ACTION: &str = "com.google.android.c2dm.intent.RECEIVE";
/// The only `message_type` value accepted; an absent value also qualifies.
pub const TRANSPORT_TYPE: &str = "gcm";
/// Attribute naming the transport message type.
pub const MESSAGE_TYPE_KEY: &str = "message_type";
/// Attribute naming the sender.
pub const FROM_KEY: &str = "from";
/// Sender of token-refresh notifications, which are not messages.
pub const TOKEN_REFRESH_SENDER: &str = "google.com/iid";
/// Attribute carrying the message priority.
pub const PRIORITY_KEY: &str = "priority";
/// Older payloads carry the priority under this key.
pub const LEGACY_PRIORITY_KEY: &str = "pri";
/// A priority strictly above this value is high.
pub const HIGH_PRIORITY_THRESHOLD: i64 = 9;

/// Message priority, derived from the `priority` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Normal,
    High,
}

impl Priority {
    /// Classify a raw priority string. Missing or malformed values count as
    /// priority 0.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let value = raw.and_then(|r| r.trim().parse::<i64>().ok()).unwrap_or(0);
        if value > HIGH_PRIORITY_THRESHOLD {
            Self::High
        } else {
            Self::Normal
        }
    }
}

/// One transport delivery: action marker, attribute map and opaque body.
///
/// `attributes` is `None` when the delivery carried no extras at all.
#[derive(Debug, Clone, Default)]
pub struct RawEvent {
    pub action: String,
    pub attributes: Option<HashMap<String, String>>,
    pub payload: Bytes,
}

impl RawEvent {
    /// A receive-action event with the given attributes.
    #[must_use]
    pub fn message(attributes: HashMap<String, String>) -> Self {
        Self {
            action: RECEIVE_ACTION.into(),
            attributes: Some(attributes),
            payload: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.as_ref()?.get(key).map(String::as_str)
    }

    /// Receive action with a `message_type` that is absent or the transport type.
    #[must_use]
    pub fn is_transport_message(&self) -> bool {
        self.action == RECEIVE_ACTION
            && self
                .attribute(MESSAGE_TYPE_KEY)
                .is_none_or(|t| t == TRANSPORT_TYPE)
    }

    #[must_use]
    pub fn is_token_refresh(&self) -> bool {
        self.attribute(FROM_KEY) == Some(TOKEN_REFRESH_SENDER)
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        Priority::parse(
            self.attribute(PRIORITY_KEY)
                .or_else(|| self.attribute(LEGACY_PRIORITY_KEY)),
        )
    }
}
