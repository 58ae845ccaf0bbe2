//! Configuration validation.
//!
//! Reports unknown keys and settings that are legal but unlikely to do what
//! the operator wants.

use crate::schema::CourierConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "intake.retry_floor"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

const KNOWN_TABLES: &[(&str, &[&str])] = &[
    (
        "intake",
        &[
            "filter_other_consumers",
            "platform_version",
            "retry_floor",
            "consumer_id",
        ],
    ),
    ("metrics", &["enabled", "labels"]),
];

/// Validate a loaded configuration.
#[must_use]
pub fn validate(config: &CourierConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let intake = &config.intake;

    if intake.consumer_id.trim().is_empty() {
        result.push(
            Severity::Error,
            "intake.consumer_id",
            "consumer id must not be empty",
        );
    }

    let floor = intake.effective_retry_floor();
    match intake.platform_version {
        None => result.push(
            Severity::Info,
            "intake.platform_version",
            "host platform version not set, the legacy tier is assumed",
        ),
        Some(version) if version < floor => result.push(
            Severity::Info,
            "intake.retry_floor",
            format!(
                "platform version {version} is below the retry floor {floor}, \
                 worker starts are never retried on this host"
            ),
        ),
        _ => {},
    }

    if intake.retry_floor == Some(0) {
        result.push(
            Severity::Warning,
            "intake.retry_floor",
            "a retry floor of 0 retries on hosts that never grant a temporary allowance",
        );
    }

    result
}

/// Validate a raw document: unknown keys first, then the typed checks.
#[must_use]
pub fn validate_value(value: &serde_json::Value) -> ValidationResult {
    let mut result = ValidationResult::default();

    if let Some(root) = value.as_object() {
        for (key, table) in root {
            let Some((_, fields)) = KNOWN_TABLES.iter().find(|(name, _)| *name == key.as_str())
            else {
                result.push(Severity::Warning, key, format!("unknown table `{key}`"));
                continue;
            };
            for field in table.as_object().into_iter().flat_map(|t| t.keys()) {
                if !fields.contains(&field.as_str()) {
                    result.push(
                        Severity::Warning,
                        &format!("{key}.{field}"),
                        format!("unknown field `{field}`"),
                    );
                }
            }
        }
    }

    match serde_json::from_value::<CourierConfig>(value.clone()) {
        Ok(config) => result.diagnostics.extend(validate(&config).diagnostics),
        Err(e) => result.push(Severity::Error, "", format!("type error: {e}")),
    }

    result
}
