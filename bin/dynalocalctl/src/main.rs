//! ---
//! dl_section: "06-control-cli"
//! dl_subsection: "binary"
//! dl_type: "source"
//! dl_scope: "code"
//! dl_description: "Control CLI preparing a local DynamoDB test environment."
//! dl_version: "v0.1.0"
//! dl_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dynalocal_common::{init_tracing, ConfigSource, LogFormat, LoggingConfig};

mod config;
mod setup;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Prepare a local DynamoDB emulator and its tables for a test run",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Reuse or launch the emulator, reconcile tables, and create the declared ones")]
    Setup(setup::SetupCommand),
    #[command(about = "Print the resolved configuration as JSON")]
    Config(config::ConfigCommand),
}

#[derive(Debug, Args)]
struct LoggingArgs {
    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormatArg::Pretty, global = true)]
    log_format: LogFormatArg,

    /// Also write daily rolling JSON logs into this directory.
    #[arg(long = "log-dir", value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::StructuredJson,
        }
    }
}

/// `--config` shared by every subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Configuration file (.toml, .yaml, .yml or .json).
    #[arg(long, value_name = "FILE", env = "DYNALOCAL_CONFIG")]
    config: Option<PathBuf>,
}

impl ConfigArgs {
    fn source(&self) -> ConfigSource {
        ConfigSource::File(self.config.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(
        "dynalocalctl",
        &LoggingConfig {
            directory: cli.logging.log_dir.clone(),
            format: cli.logging.log_format.into(),
            file_prefix: None,
        },
    )?;

    match cli.command {
        Commands::Setup(cmd) => cmd.execute().await,
        Commands::Config(cmd) => cmd.execute().await,
    }
}
