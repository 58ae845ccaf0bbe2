//! Metrics collection and export for courier.
//!
//! Wraps the `metrics` crate facade. When the `prometheus` feature is
//! enabled, a Prometheus recorder is installed and can be rendered as text.
//!
//! ```rust,ignore
//! use courier_metrics::{counter, intake};
//!
//! counter!(intake::EVENTS_TOTAL, "state" => "routed").increment(1);
//! ```

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, histogram};
