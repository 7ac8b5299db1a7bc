//! Driving one binding at a time through the volume lifecycle.
//!
//! ```text
//! unprovisioned -> created -> mounted -> verified -> unmounted -> removed
//! ```
//!
//! Create failing ends the scenario immediately. Once Create has succeeded,
//! Unmount and Remove are always attempted, whatever happened in between, and
//! Remove runs even if Unmount failed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, info_span, warn};
use volcert_mount::{
    run_probe, AccessMode, MountVerifier, NameGenerator, ProbeConfig, ProbeError, ProbeReport,
};

use crate::driver::VolumeDriver;
use crate::error::{CertError, Stage};
use crate::report::{RunReport, ScenarioReport};
use crate::request::{MountRequest, RemoveRequest, UnmountRequest};
use crate::scenario::Scenario;

/// Where a volume is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    /// Nothing done yet
    Unprovisioned,
    /// Create succeeded
    Created,
    /// Mount returned a mount point
    Mounted,
    /// Host confirmed the mount
    Verified,
    /// Unmount succeeded
    Unmounted,
    /// Remove succeeded
    Removed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unprovisioned => "unprovisioned",
            Self::Created => "created",
            Self::Mounted => "mounted",
            Self::Verified => "verified",
            Self::Unmounted => "unmounted",
            Self::Removed => "removed",
        })
    }
}

type ProbeRunner =
    fn(AccessMode, &Path, &mut NameGenerator, &ProbeConfig) -> Result<ProbeReport, ProbeError>;

/// Runs scenarios against one driver.
///
/// Owns the run's [`NameGenerator`], so probe file names never repeat within a
/// session.
pub struct CertificationSession<'a> {
    driver: &'a dyn VolumeDriver,
    verifier: &'a dyn MountVerifier,
    names: NameGenerator,
    probe: ProbeConfig,
    probe_runner: ProbeRunner,
    fail_fast: bool,
}

impl<'a> CertificationSession<'a> {
    /// Create a session with default probe settings.
    pub fn new(
        driver: &'a dyn VolumeDriver,
        verifier: &'a dyn MountVerifier,
        names: NameGenerator,
    ) -> Self {
        Self {
            driver,
            verifier,
            names,
            probe: ProbeConfig::default(),
            probe_runner: run_probe,
            fail_fast: false,
        }
    }

    /// Use custom probe settings.
    #[must_use]
    pub fn with_probe_config(mut self, probe: ProbeConfig) -> Self {
        self.probe = probe;
        self
    }

    #[cfg(test)]
    #[must_use]
    fn with_probe_runner(mut self, runner: ProbeRunner) -> Self {
        self.probe_runner = runner;
        self
    }

    /// Stop after the first failed scenario.
    #[must_use]
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Seed behind this session's probe file names.
    pub fn seed(&self) -> u64 {
        self.names.seed()
    }

    /// Run every scenario in order.
    pub fn run_all(&mut self, scenarios: &[Scenario]) -> RunReport {
        let mut reports = Vec::with_capacity(scenarios.len());
        let mut skipped = Vec::new();

        for (position, scenario) in scenarios.iter().enumerate() {
            let report = self.run_scenario(scenario);
            let failed = !report.passed();
            reports.push(report);

            if failed && self.fail_fast {
                skipped = scenarios[position + 1..]
                    .iter()
                    .map(|s| s.volume_id.clone())
                    .collect();
                if !skipped.is_empty() {
                    warn!(skipped = skipped.len(), "fail-fast: skipping remaining scenarios");
                }
                break;
            }
        }

        RunReport {
            scenarios: reports,
            skipped,
            seed: self.names.seed(),
        }
    }

    /// Run one scenario through the whole lifecycle.
    pub fn run_scenario(&mut self, scenario: &Scenario) -> ScenarioReport {
        let span = info_span!("scenario", volume = %scenario.volume_id);
        let _enter = span.enter();
        let started = Instant::now();

        info!(options = ?scenario.option_keys, access = %scenario.access, "using fixture");
        let mut report = ScenarioReport::start(scenario);

        let reply = self.driver.create(&scenario.request);
        if !reply.is_success() {
            let err = CertError::protocol(Stage::Create, &scenario.volume_id, reply.err);
            error!(error = %err, "create failed");
            report.fail(Stage::Create, &err);
            return report.finish(started.elapsed());
        }
        info!("created");
        report.advance(Stage::Create, LifecycleState::Created, None);

        if let Err((stage, err)) = self.mount_and_probe(scenario, &mut report) {
            error!(stage = %stage, kind = %err.kind(), error = %err, "scenario failed");
            report.fail(stage, &err);
        }

        self.teardown(&scenario.volume_id, &mut report);

        let report = report.finish(started.elapsed());
        if report.passed() {
            info!(elapsed = ?report.elapsed, "scenario passed");
        }
        report
    }

    fn mount_and_probe(
        &mut self,
        scenario: &Scenario,
        report: &mut ScenarioReport,
    ) -> Result<(), (Stage, CertError)> {
        let volume = &scenario.volume_id;

        let reply = self.driver.mount(&MountRequest {
            name: volume.clone(),
        });
        if !reply.err.is_empty() {
            return Err((Stage::Mount, CertError::protocol(Stage::Mount, volume, reply.err)));
        }
        if reply.mountpoint.is_empty() {
            return Err((
                Stage::Mount,
                CertError::MissingMountpoint {
                    volume: volume.clone(),
                },
            ));
        }

        let mountpoint = PathBuf::from(reply.mountpoint);
        info!(mountpoint = %mountpoint.display(), "mounted");
        report.mountpoint = Some(mountpoint.clone());
        report.advance(
            Stage::Mount,
            LifecycleState::Mounted,
            Some(mountpoint.display().to_string()),
        );

        self.verifier
            .verify(&mountpoint)
            .map_err(|e| (Stage::HostCheck, CertError::from(e)))?;
        report.advance(Stage::HostCheck, LifecycleState::Verified, None);

        let probe_runner = self.probe_runner;
        let probe = probe_runner(scenario.access, &mountpoint, &mut self.names, &self.probe)
            .map_err(|e| (Stage::Probe, CertError::from(e)))?;
        report.pass(Stage::Probe, Some(probe.path.display().to_string()));
        report.probe_file = Some(probe.path);

        Ok(())
    }

    fn teardown(&self, volume: &str, report: &mut ScenarioReport) {
        let reply = self.driver.unmount(&UnmountRequest {
            name: volume.to_string(),
        });
        if reply.is_success() {
            info!("unmounted");
            report.advance(Stage::Unmount, LifecycleState::Unmounted, None);
        } else {
            let err = CertError::protocol(Stage::Unmount, volume, reply.err);
            warn!(error = %err, "unmount failed");
            report.fail_teardown(Stage::Unmount, &err);
        }

        let reply = self.driver.remove(&RemoveRequest {
            name: volume.to_string(),
        });
        if reply.is_success() {
            info!("removed");
            report.advance(Stage::Remove, LifecycleState::Removed, None);
        } else {
            let err = CertError::protocol(Stage::Remove, volume, reply.err);
            warn!(error = %err, "remove failed");
            report.fail_teardown(Stage::Remove, &err);
        }
    }
}
