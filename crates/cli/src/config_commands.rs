use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    clap::Subcommand,
    courier_config::{CourierConfig, Severity, ValidationResult},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

/// Load the configuration from `path`, or discover it when no path is given.
/// Environment overrides are applied either way.
pub fn load(path: Option<&Path>) -> Result<CourierConfig> {
    let Some(path) = path else {
        return Ok(courier_config::discover_and_load());
    };
    let mut config = courier_config::load_config(path)
        .with_context(|| format!("loading {}", path.display()))?;
    courier_config::apply_env_overrides(&mut config);
    Ok(config)
}

pub fn handle_config(action: ConfigAction, path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load(path)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
        ConfigAction::Check { verbose } => check(path, verbose),
    }
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn diagnose(path: Option<&Path>) -> Result<(Option<PathBuf>, ValidationResult)> {
    let file = path
        .map(Path::to_path_buf)
        .or_else(courier_config::find_config_file);
    let result = match &file {
        Some(file) => courier_config::validate_value(&courier_config::load_config_value(file)?),
        None => courier_config::validate(&courier_config::discover_and_load()),
    };
    Ok((file, result))
}

fn check(path: Option<&Path>, verbose: bool) -> Result<()> {
    let (file, result) = diagnose(path)?;

    match &file {
        Some(file) => eprintln!("Checking {}\n", file.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
        shown += 1;
    }
    if shown > 0 {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn explicit_path_is_loaded() {
        let file = write_config("[intake]\nfilter_other_consumers = true\nplatform_version = 31\n");
        let config = load(Some(file.path())).unwrap();
        assert!(config.intake.filter_other_consumers);
        assert_eq!(config.intake.platform_version, Some(31));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"));
    }

    #[test]
    fn diagnose_reports_unknown_and_empty_keys() {
        let file = write_config("[intake]\nconsumer_id = \"\"\nretries = 3\n");
        let (path, result) = diagnose(Some(file.path())).unwrap();
        assert_eq!(path.as_deref(), Some(file.path()));
        assert!(result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }
}
