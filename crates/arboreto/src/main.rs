//! Arboreto - tree record ingestion
//!
//! Usage:
//!   arboreto watch               # Watch the input folder until Ctrl+C
//!   arboreto batch [--dir DIR]   # Render every record in a folder once
//!   arboreto check FILE          # Validate one record file
//!   arboreto config              # Show the resolved configuration

use anyhow::{Context, Result};
use arboreto::ArboretoConfig;
use arboreto_logging::{init_logging, LogConfig, LogHandle};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::error::HelpfulError;
use cli::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(name = "arboreto")]
#[command(about = "Watches a folder for tree records and renders them into documents")]
#[command(version)]
struct Cli {
    /// Debug-level console output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./arboreto.toml when present)
    #[arg(long, global = true, value_name = "FILE", env = "ARBORETO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the input folder and process records as they arrive
    Watch {
        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Render every record in a folder once, without archiving
    Batch {
        /// Folder to read records from (default: the watch root)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Decode and validate a single record file
    Check {
        /// Record file
        file: PathBuf,
    },

    /// Show the resolved configuration and folders
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<HelpfulError>() {
                Some(helpful) => eprint!("{}", helpful),
                None => eprintln!("{:?}", err),
            }
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = ArboretoConfig::resolve(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Watch { overrides } => {
            overrides.apply(&mut config);
            let logging = start_logging(&config, cli.verbose)?;
            let result = cli::watch::run(&config);
            logging.flush();
            result
        }
        Commands::Batch {
            dir,
            json,
            overrides,
        } => {
            overrides.apply(&mut config);
            let logging = start_logging(&config, cli.verbose)?;
            let result = cli::batch::run(&config, cli::batch::BatchArgs { dir, json });
            logging.flush();
            result
        }
        Commands::Check { file } => cli::check::run(&file),
        Commands::Config { json } => cli::config::run(&config, json),
    }
}

fn start_logging(config: &ArboretoConfig, verbose: bool) -> Result<LogHandle> {
    let logging = init_logging(LogConfig {
        app_name: "arboreto",
        log_dir: &config.log_dir,
        verbose,
    })?;
    tracing::debug!(path = %logging.log_path().display(), "Logging to file");
    Ok(logging)
}
