//! Scenario and run results.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use volcert_mount::AccessMode;

use crate::error::{CertError, FailureKind, Stage};
use crate::scenario::Scenario;
use crate::session::LifecycleState;

/// A failed step, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    /// Where it failed
    pub stage: Stage,
    /// Failure category
    pub kind: FailureKind,
    /// Failing assertion message
    pub message: String,
}

impl StageFailure {
    pub(crate) fn new(stage: Stage, err: &CertError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// One lifecycle step as it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Step
    pub stage: Stage,
    /// Whether it succeeded
    pub ok: bool,
    /// Extra detail (mount path, probe file, error text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Volume under test
    pub volume_id: String,
    /// Scenario title
    pub description: String,
    /// Option keys the binding declared
    pub option_keys: Vec<String>,
    /// Probe that ran (or would have)
    pub access: AccessMode,
    /// Lifecycle state when the scenario ended
    pub reached: LifecycleState,
    /// Mount path returned by the driver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<PathBuf>,
    /// Probe file used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_file: Option<PathBuf>,
    /// Primary failure, if any
    pub failure: Option<StageFailure>,
    /// Every teardown failure, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub teardown_failures: Vec<StageFailure>,
    /// Steps in execution order
    pub steps: Vec<StepRecord>,
    /// Wall-clock time for the scenario
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

impl ScenarioReport {
    pub(crate) fn start(scenario: &Scenario) -> Self {
        Self {
            volume_id: scenario.volume_id.clone(),
            description: scenario.description(),
            option_keys: scenario.option_keys.clone(),
            access: scenario.access,
            reached: LifecycleState::Unprovisioned,
            mountpoint: None,
            probe_file: None,
            failure: None,
            teardown_failures: Vec::new(),
            steps: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn pass(&mut self, stage: Stage, detail: Option<String>) {
        self.steps.push(StepRecord {
            stage,
            ok: true,
            detail,
        });
    }

    pub(crate) fn advance(&mut self, stage: Stage, state: LifecycleState, detail: Option<String>) {
        self.reached = state;
        self.pass(stage, detail);
    }

    pub(crate) fn fail(&mut self, stage: Stage, err: &CertError) {
        self.steps.push(StepRecord {
            stage,
            ok: false,
            detail: Some(err.to_string()),
        });
        self.failure.get_or_insert_with(|| StageFailure::new(stage, err));
    }

    pub(crate) fn fail_teardown(&mut self, stage: Stage, err: &CertError) {
        self.steps.push(StepRecord {
            stage,
            ok: false,
            detail: Some(err.to_string()),
        });
        self.teardown_failures.push(StageFailure::new(stage, err));
    }

    /// Promote the first teardown failure if nothing else failed.
    pub(crate) fn finish(mut self, elapsed: Duration) -> Self {
        if self.failure.is_none() {
            self.failure = self.teardown_failures.first().cloned();
        }
        self.elapsed = elapsed;
        self
    }

    /// Whether every step succeeded.
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// The record for `stage`, if it was attempted.
    pub fn step(&self, stage: Stage) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.stage == stage)
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Reports for every scenario that ran, in order
    pub scenarios: Vec<ScenarioReport>,
    /// Volumes not run because of fail-fast
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    /// Seed for probe file names, for reproducing a run
    pub seed: u64,
}

impl RunReport {
    /// Scenarios that passed.
    pub fn passed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.passed()).count()
    }

    /// Scenarios that failed.
    pub fn failed_count(&self) -> usize {
        self.scenarios.len() - self.passed_count()
    }

    /// True when every scenario ran and passed.
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0 && self.skipped.is_empty()
    }
}
