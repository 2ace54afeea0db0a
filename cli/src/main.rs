//! ptosc: run pt-online-schema-change migrations from the command line.
//!
//! Two subcommands:
//! - `ptosc version`: report whether the tool is installed and which version
//! - `ptosc alter`: alter one table, streaming the tool's output to the log

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use ptosc::{AvailabilityProbe, InvocationSpec, OscConfig, OscError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// ptosc: run pt-online-schema-change migrations.
#[derive(Parser)]
#[command(
    name = "ptosc",
    version,
    about = "Run pt-online-schema-change and stream its output to the log"
)]
struct Cli {
    /// Path to ptosc.toml [default: ./ptosc.toml or ~/.config/ptosc/ptosc.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the tool is installed and print its version
    Version,
    /// Alter one table with pt-online-schema-change
    Alter {
        /// Table to alter
        #[arg(short, long)]
        table: String,
        /// ALTER TABLE body without the table name, e.g. "ADD COLUMN age INT NULL"
        #[arg(short, long)]
        alter: String,
        /// Schema (database) name [default: connection.schema from config]
        #[arg(short, long)]
        schema: Option<String>,
        /// Extra options passed to the tool as one argument (overrides config)
        #[arg(long)]
        options: Option<String>,
        /// Print the command line (password masked) without running it
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing with env filter (RUST_LOG controls verbosity)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = match run(Cli::parse()).await {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!("{:#}", err);
            // Mirror the tool's own exit code when it ran and failed.
            err.downcast_ref::<OscError>()
                .and_then(OscError::exit_code)
                .filter(|code| *code > 0)
                .unwrap_or(1)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let config = match resolve_config(cli.config)? {
        Some(path) => load_config(&path).await?,
        None => {
            tracing::debug!("no ptosc.toml found, using defaults");
            OscConfig::default()
        }
    };

    match cli.command {
        Commands::Version => run_version(&config).await,
        Commands::Alter {
            table,
            alter,
            schema,
            options,
            dry_run,
        } => {
            let schema = schema
                .or_else(|| config.default_schema().map(str::to_string))
                .ok_or_else(|| {
                    anyhow::anyhow!("No schema given. Use --schema or set connection.schema.")
                })?;
            let mut spec = InvocationSpec::new(table, alter, schema);
            spec.connection = config.connection_info();
            run_alter(config, spec, options, dry_run).await
        }
    }
}

/// Probe the configured tool and print its version.
async fn run_version(config: &OscConfig) -> Result<()> {
    let probe = AvailabilityProbe::new(config.prober());
    match probe.version().await {
        Some(version) => {
            println!("{}", version);
            Ok(())
        }
        None => Err(anyhow::anyhow!(
            "{} is not available. Install Percona Toolkit or set tool.command.",
            config.tool.command
        )),
    }
}

/// Build and run the schema change, cancelling the tool on Ctrl-C.
async fn run_alter(
    mut config: OscConfig,
    spec: InvocationSpec,
    options: Option<String>,
    dry_run: bool,
) -> Result<()> {
    if let Some(options) = options {
        config.tool.additional_options = options;
    }

    if dry_run {
        println!("{}", config.command_builder().build(&spec));
        return Ok(());
    }

    let probe = AvailabilityProbe::new(config.prober());
    if !probe.is_available().await {
        return Err(anyhow::anyhow!(
            "{} is not available. Install Percona Toolkit or set tool.command.",
            config.tool.command
        ));
    }

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Interrupted, stopping pt-online-schema-change...");
        cancel_for_signal.cancel();
    });

    tracing::info!(invocation = %spec, "starting schema change");
    config.runner().run(&spec, &cancel).await?;
    tracing::info!(table = %spec.table, "schema change complete");
    Ok(())
}

/// Resolve config file path: explicit flag → ./ptosc.toml → ~/.config/ptosc/ptosc.toml.
///
/// An explicit path must exist; otherwise a missing file means built-in defaults.
fn resolve_config(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file {:?} does not exist", path));
        }
        return Ok(Some(path));
    }

    let local = Path::new("ptosc.toml");
    if local.exists() {
        return Ok(Some(local.to_path_buf()));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let xdg = config_dir.join("ptosc").join("ptosc.toml");
        if xdg.exists() {
            return Ok(Some(xdg));
        }
    }

    Ok(None)
}

/// Load, parse and validate a ptosc.toml config file.
async fn load_config(config_path: &Path) -> Result<OscConfig> {
    let content = tokio::fs::read_to_string(config_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", config_path, e))?;
    content
        .parse::<OscConfig>()
        .map_err(|e| anyhow::anyhow!("Invalid config file {:?}: {}", config_path, e))
}
