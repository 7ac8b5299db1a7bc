//! Run command - certify a driver against every binding.

use std::collections::HashSet;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;
use volcert_core::{CertificationSession, RemoteClient};
use volcert_mount::NameGenerator;

use super::FixtureArgs;
use crate::config::HarnessConfig;
use crate::output::{run_table, summary};

/// Returned when the run completed but not every scenario passed.
#[derive(Debug, thiserror::Error)]
#[error("certification failed: {failed} scenario(s) failed, {skipped} skipped")]
pub struct CertificationFailed {
    pub failed: usize,
    pub skipped: usize,
}

#[derive(ClapArgs, Clone)]
pub struct Args {
    #[command(flatten)]
    pub fixtures: FixtureArgs,

    /// Only certify these volume ids (repeatable)
    #[arg(long = "only", value_name = "VOLUME")]
    pub only: Vec<String>,

    /// Stop after the first failed scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Seed for probe file names (overrides the config file)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::run", skip_all)]
pub fn execute(args: &Args, config: &HarnessConfig, quiet: bool) -> Result<()> {
    let (template, mut scenarios) = args.fixtures.load()?;

    if !args.only.is_empty() {
        let known: HashSet<&str> = scenarios.iter().map(|s| s.volume_id.as_str()).collect();
        if let Some(missing) = args.only.iter().find(|v| !known.contains(v.as_str())) {
            anyhow::bail!("No binding with volume_id '{missing}'");
        }
        scenarios.retain(|s| args.only.contains(&s.volume_id));
    }

    let driver = RemoteClient::from_template(&template, config.driver.request_timeout)
        .context("Failed to create driver client")?;
    let verifier = config.host_check.build();
    let names = match args.seed.or(config.seed) {
        Some(seed) => NameGenerator::with_seed(seed),
        None => NameGenerator::from_time(),
    };

    let mut session = CertificationSession::new(&driver, verifier.as_ref(), names)
        .with_probe_config(config.probe.clone())
        .fail_fast(args.fail_fast);
    tracing::info!(
        driver = %driver.base_url(),
        seed = session.seed(),
        scenarios = scenarios.len(),
        "starting certification"
    );

    let report = session.run_all(&scenarios);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", run_table(&report));
        if !quiet {
            eprintln!("{}", summary(&report));
        }
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(CertificationFailed {
            failed: report.failed_count(),
            skipped: report.skipped.len(),
        }
        .into())
    }
}
