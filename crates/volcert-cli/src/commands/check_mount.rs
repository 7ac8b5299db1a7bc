//! Check-mount command - run host verification on a single path.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;
use volcert_mount::{HostCheckConfig, HostCheckMode};

use crate::config::HarnessConfig;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Mount point to look for
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Read /proc/mounts directly instead of running the shell check
    #[arg(long)]
    pub mount_table: bool,
}

#[instrument(level = "info", name = "cmd::check_mount", skip_all)]
pub fn execute(args: &Args, config: &HarnessConfig) -> Result<()> {
    let host_check = if args.mount_table {
        HostCheckConfig {
            mode: HostCheckMode::MountTable,
            ..config.host_check.clone()
        }
    } else {
        config.host_check.clone()
    };

    host_check
        .build()
        .verify(&args.path)
        .with_context(|| format!("Host check failed for {}", args.path.display()))?;

    println!("mounted: {}", args.path.display());
    Ok(())
}
