#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use volcert_core::{DriverClientError, FixtureError};
use volcert_mount::HostCheckError;

use crate::commands::run::CertificationFailed;
use crate::commands::{check_mount, plan, run};
use crate::config::HarnessConfig;

/// Compatibility certification for volume plugin drivers
#[derive(Parser)]
#[command(name = "volcert")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Show what would be certified
    volcert plan --fixture fixture.json --bindings bindings.json

    # Certify every binding, stop at the first failure
    volcert run --fixture fixture.json --bindings bindings.json --fail-fast

    # Certify one volume and emit a JSON report
    FIXTURE_FILENAME=fixture.json BINDINGS_FILE=bindings.json volcert run --only vol-A --json

    # Check whether the host sees a mount
    volcert check-mount /var/vcap/data/volumes/smb/vol-A
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (default: $VOLCERT_CONFIG_DIR/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the certification lifecycle against every binding
    Run(run::Args),

    /// List planned scenarios without contacting the driver
    Plan(plan::Args),

    /// Verify that the host shows a mount at a path
    CheckMount(check_mount::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            // Only print error if not quiet mode (quiet is parsed separately for this)
            let is_quiet = std::env::args().any(|a| a == "-q" || a == "--quiet");
            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let config = HarnessConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(args) => run::execute(&args, &config, cli.quiet),
        Commands::Plan(args) => plan::execute(&args),
        Commands::CheckMount(args) => check_mount::execute(&args, &config),
    }
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.downcast_ref::<CertificationFailed>().is_some() {
            return exit_code::CERTIFICATION_FAILED;
        }

        if let Some(fixture_err) = cause.downcast_ref::<FixtureError>() {
            return match fixture_err {
                FixtureError::Read { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                    exit_code::NOT_FOUND
                }
                _ => exit_code::FIXTURE_INVALID,
            };
        }

        if let Some(host_err) = cause.downcast_ref::<HostCheckError>()
            && host_err.is_consistency_violation()
        {
            return exit_code::CERTIFICATION_FAILED;
        }

        if let Some(DriverClientError::ReadTlsFile { source, .. }) =
            cause.downcast_ref::<DriverClientError>()
            && source.kind() == io::ErrorKind::NotFound
        {
            return exit_code::NOT_FOUND;
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && io_err.kind() == io::ErrorKind::NotFound
        {
            return exit_code::NOT_FOUND;
        }
    }

    exit_code::GENERAL_ERROR
}
