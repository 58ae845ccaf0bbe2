use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::CourierConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "courier.toml",
    "courier.yaml",
    "courier.yml",
    "courier.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<CourierConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load the config file as an untyped document, for validation.
pub fn load_config_value(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(&raw).map_err(|e| Error::parse("toml", e))?;
            serde_json::to_value(v).map_err(|e| Error::parse("json", e))
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value =
                serde_yaml::from_str(&raw).map_err(|e| Error::parse("yaml", e))?;
            serde_json::to_value(v).map_err(|e| Error::parse("json", e))
        },
        "json" => serde_json::from_str(&raw).map_err(|e| Error::parse("json", e)),
        _ => Err(Error::message(format!("unsupported config format: .{ext}"))),
    }
}

/// Discover and load config from standard locations, then apply `COURIER_*`
/// environment overrides.
///
/// Search order:
/// 1. `./courier.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/courier/courier.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `CourierConfig::default()` if no config file is found or
/// the file fails to load.
pub fn discover_and_load() -> CourierConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                CourierConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            CourierConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/courier/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}

/// Apply `COURIER_*` environment variables on top of a loaded config.
pub fn apply_env_overrides(config: &mut CourierConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut CourierConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("COURIER_FILTER_OTHER_CONSUMERS") {
        match parse_bool(&v) {
            Some(b) => config.intake.filter_other_consumers = b,
            None => warn!(value = %v, "ignoring COURIER_FILTER_OTHER_CONSUMERS: not a boolean"),
        }
    }
    if let Some(v) = lookup("COURIER_PLATFORM_VERSION") {
        match v.trim().parse() {
            Ok(n) => config.intake.platform_version = Some(n),
            Err(_) => warn!(value = %v, "ignoring COURIER_PLATFORM_VERSION: not a number"),
        }
    }
    if let Some(v) = lookup("COURIER_RETRY_FLOOR") {
        match v.trim().parse() {
            Ok(n) => config.intake.retry_floor = Some(n),
            Err(_) => warn!(value = %v, "ignoring COURIER_RETRY_FLOOR: not a number"),
        }
    }
    if let Some(v) = lookup("COURIER_CONSUMER_ID") {
        config.intake.consumer_id = v;
    }
    if let Some(v) = lookup("COURIER_METRICS_ENABLED") {
        match parse_bool(&v) {
            Some(b) => config.metrics.enabled = b,
            None => warn!(value = %v, "ignoring COURIER_METRICS_ENABLED: not a boolean"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<CourierConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse("toml", e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse("yaml", e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse("json", e)),
        _ => Err(Error::message(format!("unsupported config format: .{ext}"))),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "courier.toml",
            "[intake]\nfilter_other_consumers = true\nretry_floor = 23\n",
        );
        let cfg = load_config(&path).unwrap();
        assert!(cfg.intake.filter_other_consumers);
        assert_eq!(cfg.intake.retry_floor, Some(23));
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(&dir, "courier.yaml", "intake:\n  platform_version: 30\n");
        assert_eq!(load_config(&yaml).unwrap().intake.platform_version, Some(30));

        let json = write(&dir, "courier.json", r#"{"metrics": {"enabled": true}}"#);
        assert!(load_config(&json).unwrap().metrics.enabled);
    }

    #[test]
    fn untyped_document_keeps_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "courier.toml", "[intake]\nretry_flor = 21\n");
        let value = load_config_value(&path).unwrap();
        assert_eq!(value["intake"]["retry_flor"], 21);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "courier.ini", "x=1");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn parse_failure_names_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "courier.toml", "[intake\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::Parse { format: "toml", .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/courier.toml")).unwrap_err();
        assert!(err.to_string().starts_with("failed to read"));
    }

    #[test]
    fn env_overrides_apply_valid_values() {
        let vars = HashMap::from([
            ("COURIER_FILTER_OTHER_CONSUMERS", "yes"),
            ("COURIER_PLATFORM_VERSION", "26"),
            ("COURIER_CONSUMER_ID", "edge"),
        ]);
        let mut cfg = CourierConfig::default();
        apply_env_overrides_with(&mut cfg, |k| vars.get(k).map(|v| v.to_string()));
        assert!(cfg.intake.filter_other_consumers);
        assert_eq!(cfg.intake.platform_version, Some(26));
        assert_eq!(cfg.intake.consumer_id, "edge");
    }

    #[test]
    fn env_overrides_skip_malformed_values() {
        let vars = HashMap::from([
            ("COURIER_RETRY_FLOOR", "soon"),
            ("COURIER_METRICS_ENABLED", "maybe"),
        ]);
        let mut cfg = CourierConfig::default();
        apply_env_overrides_with(&mut cfg, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg, CourierConfig::default());
    }
}
