//! Configuration loading, env substitution, overrides and validation.
//!
//! Config files: `courier.toml`, `courier.yaml` or `courier.json`.
//! Searched in `./` then `~/.config/courier/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values and
//! `COURIER_*` environment overrides for the intake settings.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config,
        load_config_value,
    },
    schema::{
        CourierConfig, DEFAULT_CONSUMER_ID, DEFAULT_RETRY_FLOOR, IntakeConfig, MetricsConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_value},
};
