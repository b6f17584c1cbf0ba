//! notebook-autostop - stops an idle SageMaker notebook instance.
//!
//! Intended to be run from cron on the notebook instance itself.

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use notebook_autostop::config::Config;
use notebook_autostop::config::PolicyConfig;
use notebook_autostop::error::AutostopError;
use notebook_autostop::jupyter::JupyterClient;
use notebook_autostop::runner::RunOutcome;
use notebook_autostop::runner::run_once;
use notebook_autostop::sagemaker::SageMakerCli;
use tracing::debug;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stop this notebook instance once its kernels and terminals are idle.
///
/// Checks once and exits; schedule it (for example every 15 minutes) with cron.
#[derive(Parser, Debug)]
#[command(name = "notebook-autostop")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Idle time in minutes before the instance is stopped.
    #[arg(short, long, value_name = "MINUTES")]
    time: u64,

    /// Jupyter server port (default: 8443).
    #[arg(short, long)]
    port: Option<u16>,

    /// Stop once idle even if clients are connected.
    #[arg(short = 'c', long)]
    ignore_connections: bool,

    /// Path to config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    debug!("notebook-autostop v{} starting", env!("CARGO_PKG_VERSION"));

    let config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    let policy = policy_from(&args, &config)?;

    info!(
        "Checking idleness (threshold={}s, port={}, ignore_connections={})",
        policy.threshold_seconds(),
        policy.port,
        policy.ignore_connections
    );

    let jupyter = JupyterClient::new(policy.port).context("Failed to initialize Jupyter client")?;
    let sagemaker =
        SageMakerCli::from_config(&config).context("Failed to initialize SageMaker client")?;

    let outcome = run_once(policy, &jupyter, &sagemaker, &config.metadata_path)
        .await
        .context("Idle check aborted; instance left running")?;

    match outcome {
        RunOutcome::Stopped { instance } => info!("Stopped notebook instance {}", instance),
        RunOutcome::Active(verdict) => {
            debug!("Verdict: {} blocker(s)", verdict.blockers().len());
        }
    }

    Ok(())
}

/// Merge command-line flags over the config file.
///
/// `-c` and `ignore_connections = true` each enable the flag; `-p` wins over
/// the configured port.
fn policy_from(args: &Args, config: &Config) -> Result<PolicyConfig, AutostopError> {
    PolicyConfig::from_minutes(
        args.time,
        args.ignore_connections || config.ignore_connections,
        args.port.unwrap_or(config.port),
    )
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("notebook_autostop={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("notebook-autostop").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_ignore_connections_flag() {
        let policy = policy_from(&args(&["-c", "-t", "10"]), &Config::default()).unwrap();
        assert!(policy.ignore_connections);
        assert_eq!(policy.threshold_seconds(), 600);
    }

    #[test]
    fn test_ignore_connections_from_config() {
        let config = Config {
            ignore_connections: true,
            ..Config::default()
        };

        let policy = policy_from(&args(&["-t", "10"]), &config).unwrap();
        assert!(policy.ignore_connections);

        let policy = policy_from(&args(&["-t", "10"]), &Config::default()).unwrap();
        assert!(!policy.ignore_connections);
    }

    #[test]
    fn test_port_falls_back_to_config() {
        let config = Config {
            port: 9000,
            ..Config::default()
        };

        assert_eq!(policy_from(&args(&["-t", "10"]), &config).unwrap().port, 9000);
        assert_eq!(
            policy_from(&args(&["-t", "10", "-p", "8888"]), &config).unwrap().port,
            8888
        );
        assert_eq!(
            policy_from(&args(&["-t", "10"]), &Config::default()).unwrap().port,
            8443
        );
    }

    #[test]
    fn test_zero_time_is_configuration_error() {
        let err = policy_from(&args(&["-t", "0"]), &Config::default()).unwrap_err();
        assert!(matches!(err, AutostopError::Configuration(_)));
    }
}
