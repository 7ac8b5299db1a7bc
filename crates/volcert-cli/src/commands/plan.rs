//! Plan command - list the scenarios a run would execute.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use super::FixtureArgs;
use crate::output::plan_table;

#[derive(ClapArgs, Clone)]
pub struct Args {
    #[command(flatten)]
    pub fixtures: FixtureArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::plan", skip_all)]
pub fn execute(args: &Args) -> Result<()> {
    let (template, scenarios) = args.fixtures.load()?;

    if args.json {
        let output = serde_json::json!({
            "driver_name": template.driver_name,
            "driver_address": template.driver_address,
            "scenarios": scenarios.iter().map(|s| serde_json::json!({
                "index": s.index,
                "volume_id": s.volume_id,
                "description": s.description(),
                "option_keys": s.option_keys,
                "access": s.access,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if scenarios.is_empty() {
        eprintln!("No bindings to certify.");
        return Ok(());
    }

    println!("{}", plan_table(&scenarios));
    eprintln!(
        "{} scenario(s) against {} at {}",
        scenarios.len(),
        if template.driver_name.is_empty() { "driver" } else { &template.driver_name },
        template.driver_address
    );
    Ok(())
}
