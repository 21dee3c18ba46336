//! Built-in training scenarios, embedded at compile time.
//!
//! Each scenario ships with a reference session that completes it.

use super::schema::{ScenarioConfig, ScenarioError};
use super::script::ActionScript;
use crate::result::SimResult;

/// A scenario document bundled with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinScenario {
    pub id: &'static str,
    /// YAML scenario document
    pub document: &'static str,
    /// YAML reference session
    pub reference_script: &'static str,
}

impl BuiltinScenario {
    /// Parse the scenario document.
    pub fn config(&self) -> Result<ScenarioConfig, ScenarioError> {
        ScenarioConfig::from_yaml(self.document)
    }

    /// Parse the reference session.
    pub fn script(&self) -> SimResult<ActionScript> {
        ActionScript::from_yaml(self.reference_script)
    }
}

pub const BUILTIN_SCENARIOS: &[BuiltinScenario] = &[
    BuiltinScenario {
        id: "vf-manual-shock",
        document: include_str!("../../scenarios/vf-manual-shock.yaml"),
        reference_script: include_str!("../../scenarios/vf-manual-shock.script.yaml"),
    },
    BuiltinScenario {
        id: "af-cardioversion",
        document: include_str!("../../scenarios/af-cardioversion.yaml"),
        reference_script: include_str!("../../scenarios/af-cardioversion.script.yaml"),
    },
    BuiltinScenario {
        id: "bav3-pacing",
        document: include_str!("../../scenarios/bav3-pacing.yaml"),
        reference_script: include_str!("../../scenarios/bav3-pacing.script.yaml"),
    },
    BuiltinScenario {
        id: "dae-vf",
        document: include_str!("../../scenarios/dae-vf.yaml"),
        reference_script: include_str!("../../scenarios/dae-vf.script.yaml"),
    },
];

/// Look up a built-in scenario by id
#[must_use]
pub fn builtin(id: &str) -> Option<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS.iter().find(|s| s.id == id)
}
