//! Turning fixtures into an ordered list of scenarios.

use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;
use volcert_mount::AccessMode;

use crate::fixture::{Binding, FixtureError, FixtureTemplate};
use crate::request::{access_mode, build_create_request, CreateRequest};

/// One binding, ready to run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    /// Position in the bindings file
    pub index: usize,
    /// Volume name used for every driver call
    pub volume_id: String,
    /// Option keys the binding declared
    pub option_keys: Vec<String>,
    /// Which probe runs
    pub access: AccessMode,
    /// Create request sent to the driver
    #[serde(skip)]
    pub request: CreateRequest,
}

impl Scenario {
    /// Human-readable scenario title.
    pub fn description(&self) -> String {
        format!(
            "given a mounted volume with options: {}",
            self.option_keys.join(",")
        )
    }
}

/// Validate fixtures and plan one scenario per binding, in file order.
///
/// Fails on the first setup defect; nothing is planned in that case.
pub fn plan_scenarios(
    template: &FixtureTemplate,
    bindings: &[Binding],
) -> Result<Vec<Scenario>, FixtureError> {
    template.validate()?;

    let mut seen = HashSet::with_capacity(bindings.len());
    let mut scenarios = Vec::with_capacity(bindings.len());

    for (index, binding) in bindings.iter().enumerate() {
        if binding.volume_id.is_empty() {
            return Err(FixtureError::EmptyVolumeId { index });
        }
        if !seen.insert(binding.volume_id.as_str()) {
            return Err(FixtureError::DuplicateVolumeId(binding.volume_id.clone()));
        }

        let built = build_create_request(template, binding);
        if !built.overridden_reserved.is_empty() {
            warn!(
                volume = %binding.volume_id,
                keys = ?built.overridden_reserved,
                "binding values for reserved keys are ignored, template values are used"
            );
        }

        scenarios.push(Scenario {
            index,
            volume_id: binding.volume_id.clone(),
            access: access_mode(&built.request.opts),
            option_keys: built.option_keys,
            request: built.request,
        });
    }

    Ok(scenarios)
}
