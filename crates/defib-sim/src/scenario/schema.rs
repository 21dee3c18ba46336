//! Scenario document schema.
//!
//! A scenario is an ordered list of steps. Each step has a validation tree
//! over device properties and events, optional constraints that fail the run
//! when broken, and completion actions that patch the device.
//!
//! ```yaml
//! id: vf-manual-shock
//! title: Manual defibrillation of VF
//! initialState: { rhythmType: fibrillationVentriculaire }
//! steps:
//!   - step: 0
//!     description: Select manual mode
//!     validation: { type: stateChange, property: displayMode, value: Manuel }
//!   - step: 1
//!     validation:
//!       all_of:
//!         - { type: event, event: shockDelivered }
//!         - { type: stateChange, property: manualEnergy, value: "200" }
//!     constraints:
//!       - { property: isSynchroMode, mustBe: false, failMessage: "VF is never synchronized" }
//!     onComplete:
//!       - { set: { rhythmType: sinus }, delayMs: 2000 }
//! ```

use crate::device::{DeviceEvent, DeviceState, DeviceStatePatch};
use crate::result::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Root scenario document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    /// Unique identifier
    pub id: String,
    /// Human-readable title
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Overlay applied to a freshly reset device when the scenario starts
    #[serde(default, skip_serializing_if = "DeviceStatePatch::is_empty")]
    pub initial_state: DeviceStatePatch,
    /// Steps in the order the trainee must complete them
    pub steps: Vec<ScenarioStep>,
}

/// One required trainee action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStep {
    /// Declared step number (informational)
    #[serde(default)]
    pub step: usize,
    #[serde(default)]
    pub description: String,
    /// What must hold for the step to complete
    pub validation: Validation,
    /// Properties that must (not) hold while the step is active
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    /// Patches applied when the step completes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_complete: Vec<CompletionAction>,
}

/// Condition tree. A group node carries nothing but its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum Validation {
    /// Every child holds
    AllOf { all_of: Vec<Validation> },
    /// At least one child holds
    AnyOf { any_of: Vec<Validation> },
    /// A leaf condition
    Single(Condition),
}

/// Leaf predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", deny_unknown_fields)]
pub enum Condition {
    /// `DeviceState[property]` equals `value`
    StateChange {
        property: String,
        value: serde_json::Value,
    },
    /// The event being evaluated carries this name
    Event { event: String },
    /// `duration` ms have elapsed since the step became active
    Timeout { duration: u64 },
}

/// A property the device must (or must not) hold while a step is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_be: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_not_be: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_message: Option<String>,
}

/// A device patch applied on step completion, optionally delayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionAction {
    pub set: DeviceStatePatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl CompletionAction {
    /// Delay before the patch applies; zero means immediately
    #[must_use]
    pub fn delay(&self) -> u64 {
        self.delay_ms.unwrap_or(0)
    }
}

impl Validation {
    /// Visit every leaf condition, depth first.
    pub fn for_each_condition<'a>(&'a self, visit: &mut impl FnMut(&'a Condition)) {
        match self {
            Self::AllOf { all_of: children } | Self::AnyOf { any_of: children } => {
                for child in children {
                    child.for_each_condition(visit);
                }
            }
            Self::Single(condition) => visit(condition),
        }
    }

    /// Distinct timeout durations anywhere in the tree, ascending.
    #[must_use]
    pub fn timeout_durations(&self) -> BTreeSet<u64> {
        let mut durations = BTreeSet::new();
        self.for_each_condition(&mut |condition| {
            if let Condition::Timeout { duration } = condition {
                durations.insert(*duration);
            }
        });
        durations
    }

    fn has_empty_group(&self) -> bool {
        match self {
            Self::AllOf { all_of: children } | Self::AnyOf { any_of: children } => {
                children.is_empty() || children.iter().any(Self::has_empty_group)
            }
            Self::Single(_) => false,
        }
    }
}

impl Constraint {
    /// Message reported when the constraint is broken
    #[must_use]
    pub fn failure_message(&self) -> String {
        self.fail_message.clone().unwrap_or_else(|| {
            match (&self.must_be, &self.must_not_be) {
                (Some(expected), _) => format!("{} must be {expected}", self.property),
                (None, Some(forbidden)) => format!("{} must not be {forbidden}", self.property),
                (None, None) => format!("{} constraint violated", self.property),
            }
        })
    }
}

/// Non-fatal problems in a scenario document.
///
/// These would never let the scenario progress (or never trip a constraint)
/// but do not stop it from loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioDiagnostic {
    UnknownProperty { step: usize, property: String },
    UnknownEvent { step: usize, event: String },
    StepNumberMismatch { index: usize, declared: usize },
}

impl fmt::Display for ScenarioDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProperty { step, property } => {
                write!(f, "step {step}: unknown device property '{property}'")
            }
            Self::UnknownEvent { step, event } => {
                write!(f, "step {step}: no device event is named '{event}'")
            }
            Self::StepNumberMismatch { index, declared } => {
                write!(f, "step at index {index} is numbered {declared}")
            }
        }
    }
}

impl ScenarioConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ScenarioError> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| ScenarioError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ScenarioError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a document; `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json(&text)?
        } else {
            Self::from_yaml(&text)?
        };
        Ok(config)
    }

    /// Structural checks. A document that fails these cannot be played.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.id.trim().is_empty() {
            return Err(ScenarioError::EmptyId);
        }
        if self.steps.is_empty() {
            return Err(ScenarioError::NoSteps);
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.validation.has_empty_group() {
                return Err(ScenarioError::EmptyGroup { step: index });
            }
            if step.validation.timeout_durations().contains(&0) {
                return Err(ScenarioError::ZeroTimeout { step: index });
            }
            for constraint in &step.constraints {
                if constraint.must_be.is_none() && constraint.must_not_be.is_none() {
                    return Err(ScenarioError::EmptyConstraint {
                        step: index,
                        property: constraint.property.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Names that no device property or event matches, and misnumbered steps.
    #[must_use]
    pub fn lint(&self) -> Vec<ScenarioDiagnostic> {
        let mut diagnostics = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.step != index {
                diagnostics.push(ScenarioDiagnostic::StepNumberMismatch {
                    index,
                    declared: step.step,
                });
            }
            step.validation.for_each_condition(&mut |condition| match condition {
                Condition::StateChange { property, .. } if !DeviceState::has_property(property) => {
                    diagnostics.push(ScenarioDiagnostic::UnknownProperty {
                        step: index,
                        property: property.clone(),
                    });
                }
                Condition::Event { event } if !DeviceEvent::is_known_name(event) => {
                    diagnostics.push(ScenarioDiagnostic::UnknownEvent {
                        step: index,
                        event: event.clone(),
                    });
                }
                _ => {}
            });
            for constraint in &step.constraints {
                if !DeviceState::has_property(&constraint.property) {
                    diagnostics.push(ScenarioDiagnostic::UnknownProperty {
                        step: index,
                        property: constraint.property.clone(),
                    });
                }
            }
        }
        diagnostics
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> Result<String, ScenarioError> {
        serde_yaml_ng::to_string(self).map_err(|e| ScenarioError::ParseError(e.to_string()))
    }
}

/// Errors that can occur during scenario parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to parse scenario: {0}")]
    ParseError(String),

    #[error("Scenario id cannot be empty")]
    EmptyId,

    #[error("Scenario has no steps")]
    NoSteps,

    #[error("Step {step} has an empty all_of/any_of group")]
    EmptyGroup { step: usize },

    #[error("Step {step} has a zero-length timeout")]
    ZeroTimeout { step: usize },

    #[error("Step {step}: constraint on '{property}' has neither mustBe nor mustNotBe")]
    EmptyConstraint { step: usize, property: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::device::{DisplayMode, RhythmType};
    use serde_json::json;

    const SAMPLE: &str = r#"
id: sample
title: Sample
initialState:
  rhythmType: fibrillationVentriculaire
steps:
  - step: 0
    description: Manual mode
    validation: { type: stateChange, property: displayMode, value: Manuel }
  - step: 1
    validation:
      any_of:
        - { type: event, event: shockDelivered }
        - all_of:
            - { type: timeout, duration: 30000 }
            - { type: stateChange, property: isCharged, value: true }
    constraints:
      - { property: rhythmType, mustNotBe: asystole, failMessage: "Patient lost" }
    onComplete:
      - set: { rhythmType: sinus }
        delayMs: 2000
"#;

    #[test]
    fn test_parse_sample() {
        let config = ScenarioConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.id, "sample");
        assert_eq!(
            config.initial_state.rhythm_type,
            Some(RhythmType::FibrillationVentriculaire)
        );
        assert_eq!(config.steps.len(), 2);
        assert_eq!(
            config.steps[0].validation,
            Validation::Single(Condition::StateChange {
                property: "displayMode".into(),
                value: json!("Manuel"),
            })
        );
        let step = &config.steps[1];
        assert!(matches!(step.validation, Validation::AnyOf { .. }));
        assert_eq!(step.constraints[0].must_not_be, Some(json!("asystole")));
        assert_eq!(step.on_complete[0].delay(), 2000);
        assert_eq!(
            step.validation.timeout_durations().into_iter().collect::<Vec<_>>(),
            vec![30000]
        );
        assert!(config.lint().is_empty());
    }

    #[test]
    fn test_json_equivalent() {
        let json = r#"{
            "id": "json",
            "steps": [{
                "validation": {"type": "event", "event": "chargeCompleted"},
                "onComplete": [{"set": {"displayMode": "DAE"}}]
            }]
        }"#;
        let config = ScenarioConfig::from_json(json).unwrap();
        assert_eq!(
            config.steps[0].on_complete[0].set.display_mode,
            Some(DisplayMode::Dae)
        );
        assert_eq!(config.steps[0].on_complete[0].delay(), 0);
    }

    #[test]
    fn test_structural_errors() {
        let no_steps = "id: x\nsteps: []\n";
        assert_eq!(
            ScenarioConfig::from_yaml(no_steps).unwrap_err(),
            ScenarioError::NoSteps
        );

        let empty_group = "id: x\nsteps:\n  - validation: { all_of: [] }\n";
        assert_eq!(
            ScenarioConfig::from_yaml(empty_group).unwrap_err(),
            ScenarioError::EmptyGroup { step: 0 }
        );

        let zero = "id: x\nsteps:\n  - validation: { type: timeout, duration: 0 }\n";
        assert_eq!(
            ScenarioConfig::from_yaml(zero).unwrap_err(),
            ScenarioError::ZeroTimeout { step: 0 }
        );

        let bare = "id: x\nsteps:\n  - validation: { type: event, event: chargeStarted }\n    constraints:\n      - { property: isPacing }\n";
        assert!(matches!(
            ScenarioConfig::from_yaml(bare).unwrap_err(),
            ScenarioError::EmptyConstraint { .. }
        ));

        let blank_id = "id: '  '\nsteps:\n  - validation: { type: event, event: chargeStarted }\n";
        assert_eq!(
            ScenarioConfig::from_yaml(blank_id).unwrap_err(),
            ScenarioError::EmptyId
        );
    }

    #[test]
    fn test_unknown_condition_type_is_parse_error() {
        let doc = "id: x\nsteps:\n  - validation: { type: heartbeat }\n";
        assert!(matches!(
            ScenarioConfig::from_yaml(doc).unwrap_err(),
            ScenarioError::ParseError(_)
        ));
    }

    #[test]
    fn test_mixed_group_and_leaf_is_parse_error() {
        let group_with_type = r#"
id: x
steps:
  - validation:
      type: event
      event: chargeStarted
      all_of:
        - { type: event, event: shockDelivered }
"#;
        assert!(matches!(
            ScenarioConfig::from_yaml(group_with_type).unwrap_err(),
            ScenarioError::ParseError(_)
        ));

        let both_groups = r#"
id: x
steps:
  - validation:
      all_of: [{ type: event, event: chargeStarted }]
      any_of: [{ type: event, event: shockDelivered }]
"#;
        assert!(ScenarioConfig::from_yaml(both_groups).is_err());

        let leaf_typo = "id: x\nsteps:\n  - validation: { type: timeout, duration: 10, durationMs: 5 }\n";
        assert!(ScenarioConfig::from_yaml(leaf_typo).is_err());
    }

    #[test]
    fn test_patch_rejects_bookkeeping() {
        let doc = "id: x\ninitialState: { shockCount: 3 }\nsteps:\n  - validation: { type: event, event: chargeStarted }\n";
        assert!(matches!(
            ScenarioConfig::from_yaml(doc).unwrap_err(),
            ScenarioError::ParseError(_)
        ));
    }

    #[test]
    fn test_lint_flags_unknown_names() {
        let doc = r#"
id: lint
steps:
  - step: 0
    validation:
      all_of:
        - { type: stateChange, property: batteryLevel, value: 3 }
        - { type: event, event: shockDelivred }
    constraints:
      - { property: rhythm, mustBe: sinus }
  - step: 5
    validation: { type: event, event: chargeStarted }
"#;
        let config = ScenarioConfig::from_yaml(doc).unwrap();
        let diagnostics = config.lint();
        assert_eq!(diagnostics.len(), 4);
        assert_eq!(
            diagnostics[0],
            ScenarioDiagnostic::UnknownProperty {
                step: 0,
                property: "batteryLevel".into()
            }
        );
        assert!(diagnostics[1].to_string().contains("shockDelivred"));
        assert_eq!(
            diagnostics[3],
            ScenarioDiagnostic::StepNumberMismatch {
                index: 1,
                declared: 5
            }
        );
    }

    #[test]
    fn test_default_failure_messages() {
        let constraint = Constraint {
            property: "isSynchroMode".into(),
            must_be: Some(json!(true)),
            must_not_be: None,
            fail_message: None,
        };
        assert_eq!(constraint.failure_message(), "isSynchroMode must be true");
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_path = dir.path().join("s.yaml");
        std::fs::write(&yaml_path, SAMPLE).unwrap();
        assert_eq!(ScenarioConfig::load(&yaml_path).unwrap().id, "sample");

        let config = ScenarioConfig::from_yaml(SAMPLE).unwrap();
        let json_path = dir.path().join("s.json");
        std::fs::write(&json_path, serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(ScenarioConfig::load(&json_path).unwrap(), config);
    }
}
