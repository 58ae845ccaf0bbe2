use crate::{normalizer::NormalizeError, routing::RoutingChoice};

/// Crate-wide result type for intake dispatch.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a single dispatch. None of them outlive the event.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The payload could not be normalized into a typed message.
    #[error("payload normalization failed: {0}")]
    Normalization(#[from] NormalizeError),

    /// The routed channel refused the task, after any permitted retry.
    #[error("{route} channel unavailable after {attempts} attempt(s): {reason}")]
    ChannelUnavailable {
        route: RoutingChoice,
        attempts: u32,
        reason: String,
    },
}

impl Error {
    #[must_use]
    pub fn channel_unavailable(
        route: RoutingChoice,
        attempts: u32,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::ChannelUnavailable {
            route,
            attempts,
            reason: reason.to_string(),
        }
    }

    /// Number of channel invocations made before giving up, if any.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Normalization(_) => 0,
            Self::ChannelUnavailable { attempts, .. } => *attempts,
        }
    }
}
