mod config_commands;
mod replay_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    courier_metrics::{MetricsRecorderConfig, init_metrics},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "courier", about = "Courier: push intake dispatcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of searching the default locations.
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch newline-delimited JSON events and print one outcome per line.
    Replay {
        file: PathBuf,
        /// Register another consumer for the receive action (repeatable).
        #[arg(long = "competitor")]
        competitors: Vec<String>,
        /// Disable every competing consumer before replaying.
        #[arg(long, default_value_t = false)]
        disable_competitors: bool,
        /// Print collected metrics to stderr when done.
        #[arg(long, default_value_t = false)]
        metrics: bool,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries replay records.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    match cli.command {
        Commands::Replay {
            ref file,
            ref competitors,
            disable_competitors,
            metrics,
        } => {
            let config = config_commands::load(cli.config.as_deref())?;
            for d in courier_config::validate(&config).diagnostics {
                warn!(severity = %d.severity, path = %d.path, "{}", d.message);
            }

            let handle = init_metrics(MetricsRecorderConfig {
                enabled: config.metrics.enabled || metrics,
                global_labels: config
                    .metrics
                    .labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })?;

            replay_commands::handle_replay(&config, replay_commands::ReplayOptions {
                file,
                competitors: competitors.clone(),
                disable_competitors,
            })
            .await?;

            if metrics {
                eprint!("{}", handle.render());
            }
            Ok(())
        },
        Commands::Config { action } => config_commands::handle_config(action, cli.config.as_deref()),
    }
}
