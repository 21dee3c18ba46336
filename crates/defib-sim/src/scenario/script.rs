//! Timed trainee sessions.
//!
//! An [`ActionScript`] is a list of device actions interleaved with waits,
//! replayed against a [`ScenarioEngine`] in virtual time:
//!
//! ```yaml
//! description: Shock VF at 200 J
//! scenario: vf-manual-shock
//! steps:
//!   - { action: setDisplayMode, mode: Manuel }
//!   - { action: setManualEnergy, energy: "200" }
//!   - { action: startCharging }
//!   - wait: 5000
//!   - { action: deliverShock }
//! ```

use super::engine::ScenarioEngine;
use crate::device::DeviceAction;
use crate::result::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One script entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    /// Let `wait` ms of virtual time pass
    Wait { wait: u64 },
    /// Press a control
    Act(DeviceAction),
}

/// A replayable trainee session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionScript {
    #[serde(default)]
    pub description: String,
    /// Id of the scenario this session is meant for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    pub steps: Vec<ScriptStep>,
}

/// What happened during a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSummary {
    /// Actions dispatched
    pub actions: usize,
    /// Actions the device accepted
    pub accepted: usize,
    /// Virtual time spent in waits
    pub waited_ms: u64,
    /// Replay ended early because the scenario failed
    pub stopped_on_failure: bool,
}

impl ActionScript {
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| SimError::script(e.to_string()))
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        serde_json::from_str(json).map_err(|e| SimError::script(e.to_string()))
    }

    /// Load a script; `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    /// Total virtual time of all waits
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.steps
            .iter()
            .map(|step| match step {
                ScriptStep::Wait { wait } => *wait,
                ScriptStep::Act(_) => 0,
            })
            .sum()
    }

    /// Replay against `engine`. Stops early if the running scenario fails.
    pub fn play(&self, engine: &mut ScenarioEngine) -> PlaybackSummary {
        let mut summary = PlaybackSummary::default();
        for step in &self.steps {
            match step {
                ScriptStep::Wait { wait } => {
                    engine.advance(*wait);
                    summary.waited_ms += wait;
                }
                ScriptStep::Act(action) => {
                    let accepted = engine.dispatch(action);
                    summary.actions += 1;
                    if accepted {
                        summary.accepted += 1;
                    }
                    debug!(
                        at_ms = engine.now_ms(),
                        action = %action.label(),
                        accepted,
                        "script action"
                    );
                }
            }
            if engine.failure_message().is_some() {
                summary.stopped_on_failure = true;
                break;
            }
        }
        info!(
            actions = summary.actions,
            accepted = summary.accepted,
            waited_ms = summary.waited_ms,
            "script finished"
        );
        summary
    }
}
