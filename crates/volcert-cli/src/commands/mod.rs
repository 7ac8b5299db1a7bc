pub mod check_mount;
pub mod plan;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use volcert_core::{load_bindings, plan_scenarios, FixtureTemplate, Scenario};

/// Fixture file locations shared by `run` and `plan`.
#[derive(ClapArgs, Clone, Debug)]
pub struct FixtureArgs {
    /// Fixture template (driver address, default source and credentials)
    #[arg(long, env = "FIXTURE_FILENAME", value_name = "FILE")]
    pub fixture: PathBuf,

    /// Bindings to certify (JSON array)
    #[arg(long, env = "BINDINGS_FILE", value_name = "FILE")]
    pub bindings: PathBuf,
}

impl FixtureArgs {
    /// Load both files and plan the scenarios.
    pub fn load(&self) -> Result<(FixtureTemplate, Vec<Scenario>)> {
        let template = FixtureTemplate::load(&self.fixture)
            .with_context(|| format!("Invalid fixture template: {}", self.fixture.display()))?;
        let bindings = load_bindings(&self.bindings)
            .with_context(|| format!("Invalid bindings: {}", self.bindings.display()))?;
        let scenarios = plan_scenarios(&template, &bindings).context("Fixture validation failed")?;

        tracing::info!(
            driver = %template.driver_name,
            address = %template.driver_address,
            scenarios = scenarios.len(),
            "fixtures loaded"
        );
        Ok((template, scenarios))
    }
}
