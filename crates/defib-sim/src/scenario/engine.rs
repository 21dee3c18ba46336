//! Scenario player.
//!
//! The engine owns the [`Defibrillator`] and a scheduler for its own timers
//! (step timeouts, delayed completion patches). Every inbound action and every
//! fired timer is followed by [`ScenarioEngine::observe`], which drains the
//! device event log from the engine's cursor and evaluates the active step
//! once per new event, then once more against the bare state. Charge ticks
//! and button releases change the state without logging anything.

use super::condition::EvalContext;
use super::schema::{ScenarioConfig, ScenarioError, ScenarioStep};
use crate::config::DeviceTiming;
use crate::device::{Defibrillator, DeviceAction, DeviceEvent, DeviceStatePatch};
use crate::scheduler::{Scheduler, TaskHandle};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Progress of the current (or last) scenario run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRuntime {
    pub current_step_index: usize,
    pub is_active: bool,
    pub is_complete: bool,
    pub failure_message: Option<String>,
    /// Steps completed so far, in order
    pub completed: Vec<StepRecord>,
}

/// When a step was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub step: usize,
    pub completed_at_ms: u64,
}

/// Scenario timer payloads. Each carries the run that scheduled it so a
/// stale firing from an earlier run is recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScenarioTask {
    StepTimeout {
        run: u64,
        step: usize,
        after_ms: u64,
    },
    DelayedPatch {
        run: u64,
        patch: DeviceStatePatch,
    },
}

/// Drives a device through a scenario and reports progress.
#[derive(Debug)]
pub struct ScenarioEngine {
    device: Defibrillator,
    config: Option<Arc<ScenarioConfig>>,
    runtime: ScenarioRuntime,
    timers: Scheduler<ScenarioTask>,
    step_timeouts: Vec<TaskHandle>,
    cursor: u64,
    run: u64,
    step_started_ms: u64,
}

impl Default for ScenarioEngine {
    fn default() -> Self {
        Self::new(Defibrillator::default())
    }
}

impl ScenarioEngine {
    #[must_use]
    pub fn new(device: Defibrillator) -> Self {
        let cursor = device.events().next_seq();
        Self {
            device,
            config: None,
            runtime: ScenarioRuntime::default(),
            timers: Scheduler::new(),
            step_timeouts: Vec::new(),
            cursor,
            run: 0,
            step_started_ms: 0,
        }
    }

    /// Engine around a fresh device with the given timing
    #[must_use]
    pub fn with_timing(timing: DeviceTiming) -> Self {
        Self::new(Defibrillator::new(timing))
    }

    #[must_use]
    pub fn device(&self) -> &Defibrillator {
        &self.device
    }

    #[must_use]
    pub fn runtime(&self) -> &ScenarioRuntime {
        &self.runtime
    }

    /// The loaded scenario, if any
    #[must_use]
    pub fn config(&self) -> Option<&ScenarioConfig> {
        self.config.as_deref()
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.device.now_ms()
    }

    /// The step the trainee is working on
    #[must_use]
    pub fn current_step(&self) -> Option<&ScenarioStep> {
        if !self.runtime.is_active {
            return None;
        }
        self.config
            .as_ref()
            .and_then(|config| config.steps.get(self.runtime.current_step_index))
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.runtime.is_active
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.runtime.is_complete
    }

    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        self.runtime.failure_message.as_deref()
    }

    /// Scenario timers still pending
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Start (or restart) a scenario.
    ///
    /// Fails fast on structural problems. Unknown property or event names are
    /// reported loudly but do not prevent the run.
    pub fn start_scenario(&mut self, config: ScenarioConfig) -> Result<(), ScenarioError> {
        config.validate()?;
        for diagnostic in config.lint() {
            warn!(scenario = %config.id, "{diagnostic}");
            if cfg!(debug_assertions) {
                error!(scenario = %config.id, "scenario document problem: {diagnostic}");
            }
        }

        self.cancel_all_timers();
        self.run += 1;

        self.device.reset_state();
        self.device.apply_patch(&config.initial_state);
        // Setup events are not trainee actions.
        self.device.clear_last_event();
        self.cursor = self.device.events().next_seq();

        info!(
            scenario = %config.id,
            steps = config.steps.len(),
            "scenario started"
        );
        self.config = Some(Arc::new(config));
        self.runtime = ScenarioRuntime {
            is_active: true,
            ..ScenarioRuntime::default()
        };
        self.step_started_ms = self.now_ms();
        self.arm_timeouts();
        self.evaluate(None);
        self.observe();
        Ok(())
    }

    /// Stop the run and forget it. Pending timeouts and delayed patches are
    /// cancelled; the device keeps its state.
    pub fn stop_scenario(&mut self) {
        self.cancel_all_timers();
        self.run += 1;
        if self.runtime.is_active {
            info!(step = self.runtime.current_step_index, "scenario stopped");
        }
        self.config = None;
        self.runtime = ScenarioRuntime::default();
    }

    /// Apply one device action, then evaluate.
    pub fn dispatch(&mut self, action: &DeviceAction) -> bool {
        self.act(|device| device.dispatch(action))
    }

    /// Run arbitrary device operations, then evaluate.
    pub fn act<R>(&mut self, operate: impl FnOnce(&mut Defibrillator) -> R) -> R {
        let result = operate(&mut self.device);
        self.observe();
        result
    }

    /// Run device and scenario timers forward by `ms` of virtual time.
    ///
    /// Timers fire in due order; at the same instant device timers go first so
    /// a step timeout sees the device's state at that instant.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms().saturating_add(ms);
        loop {
            let device_due = self.device.next_due().filter(|&due| due <= target);
            let scenario_due = self.timers.next_due().filter(|&due| due <= target);
            match (device_due, scenario_due) {
                (Some(d), Some(s)) if d <= s => {
                    self.device.step_until(d);
                }
                (Some(d), None) => {
                    self.device.step_until(d);
                }
                (_, Some(s)) => self.fire_scenario_timer(s),
                (None, None) => break,
            }
            self.observe();
        }
        self.device.advance_clock_to(target);
    }

    /// Drain new device events and evaluate the active step once per event,
    /// then once with no event so silent state changes are seen too.
    pub fn observe(&mut self) {
        self.drain_events();
        if self.runtime.is_active {
            self.evaluate(None);
            // A completion patch may have logged events of its own.
            self.drain_events();
        }
    }

    fn drain_events(&mut self) {
        loop {
            let fresh: Vec<DeviceEvent> = self
                .device
                .events()
                .since(self.cursor)
                .iter()
                .map(|record| record.event.clone())
                .collect();
            if fresh.is_empty() {
                return;
            }
            self.cursor = self.device.events().next_seq();
            for event in &fresh {
                if !self.runtime.is_active {
                    break;
                }
                self.evaluate(Some(event));
            }
        }
    }

    fn fire_scenario_timer(&mut self, due_ms: u64) {
        self.device.advance_clock_to(due_ms);
        let Some(fired) = self.timers.pop_due(due_ms) else {
            return;
        };
        match fired.task {
            ScenarioTask::StepTimeout {
                run,
                step,
                after_ms,
            } => {
                self.step_timeouts.retain(|h| *h != fired.handle);
                if run != self.run
                    || !self.runtime.is_active
                    || step != self.runtime.current_step_index
                {
                    debug!(step, "stale step timeout dropped");
                    return;
                }
                debug!(step, after_ms, "step timeout elapsed");
                self.device.record(DeviceEvent::TimeoutCompleted {
                    elapsed_ms: after_ms,
                });
            }
            ScenarioTask::DelayedPatch { run, patch } => {
                if run != self.run {
                    debug!("stale completion patch dropped");
                    return;
                }
                debug!("applying delayed completion patch");
                self.device.apply_patch(&patch);
            }
        }
    }

    /// Evaluate the active step; completed steps cascade into the next one,
    /// which is evaluated without an event.
    fn evaluate(&mut self, event: Option<&DeviceEvent>) {
        let mut event = event;
        while self.runtime.is_active {
            let Some(config) = self.config.clone() else {
                return;
            };
            let index = self.runtime.current_step_index;
            let Some(step) = config.steps.get(index) else {
                return;
            };

            let ctx = EvalContext::new(self.device.state(), event);
            if let Some(broken) = step.constraints.iter().find(|c| c.is_violated(&ctx)) {
                self.fail(broken.failure_message());
                return;
            }
            if !step.validation.evaluate(&ctx) {
                return;
            }
            self.complete_step(&config, index);
            event = None;
        }
    }

    fn complete_step(&mut self, config: &ScenarioConfig, index: usize) {
        let now = self.now_ms();
        let step = &config.steps[index];
        info!(
            scenario = %config.id,
            step = index,
            elapsed_ms = now.saturating_sub(self.step_started_ms),
            "step completed"
        );
        self.runtime.completed.push(StepRecord {
            step: index,
            completed_at_ms: now,
        });
        self.cancel_step_timeouts();

        for action in &step.on_complete {
            match action.delay() {
                0 => self.device.apply_patch(&action.set),
                delay => {
                    self.timers.schedule_after(
                        now,
                        delay,
                        ScenarioTask::DelayedPatch {
                            run: self.run,
                            patch: action.set.clone(),
                        },
                    );
                }
            }
        }

        self.runtime.current_step_index = index + 1;
        if self.runtime.current_step_index >= config.steps.len() {
            self.runtime.is_active = false;
            self.runtime.is_complete = true;
            info!(scenario = %config.id, "scenario complete");
        } else {
            self.step_started_ms = now;
            self.arm_timeouts();
        }
    }

    fn arm_timeouts(&mut self) {
        let Some(step) = self.current_step() else {
            return;
        };
        let durations = step.validation.timeout_durations();
        let now = self.now_ms();
        let index = self.runtime.current_step_index;
        for duration in durations {
            let handle = self.timers.schedule_after(
                now,
                duration,
                ScenarioTask::StepTimeout {
                    run: self.run,
                    step: index,
                    after_ms: duration,
                },
            );
            self.step_timeouts.push(handle);
        }
    }

    fn fail(&mut self, message: String) {
        warn!(
            step = self.runtime.current_step_index,
            reason = %message,
            "scenario failed"
        );
        self.runtime.failure_message = Some(message);
        self.runtime.is_active = false;
        self.cancel_all_timers();
    }

    fn cancel_step_timeouts(&mut self) {
        for handle in self.step_timeouts.drain(..) {
            self.timers.cancel(handle);
        }
    }

    fn cancel_all_timers(&mut self) {
        self.step_timeouts.clear();
        let cancelled = self.timers.clear();
        if cancelled > 0 {
            debug!(cancelled, "scenario timers cancelled");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::device::{DisplayMode, RhythmType};

    fn scenario(yaml: &str) -> ScenarioConfig {
        ScenarioConfig::from_yaml(yaml).unwrap()
    }

    const TWO_STEPS: &str = r#"
id: two-steps
steps:
  - step: 0
    validation: { type: stateChange, property: displayMode, value: Manuel }
  - step: 1
    validation: { type: event, event: chargeCompleted }
    onComplete:
      - set: { rhythmType: asystole }
      - set: { rhythmType: sinus }
        delayMs: 3000
"#;

    #[test]
    fn test_steps_advance_in_order() {
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(TWO_STEPS)).unwrap();
        assert!(engine.is_active());
        assert_eq!(engine.runtime().current_step_index, 0);

        // Charging first does not skip step 0.
        engine.act(|d| d.set_display_mode(DisplayMode::Moniteur));
        assert_eq!(engine.runtime().current_step_index, 0);

        engine.act(|d| d.set_display_mode(DisplayMode::Manuel));
        assert_eq!(engine.runtime().current_step_index, 1);

        engine.dispatch(&DeviceAction::StartCharging);
        engine.advance(5000);
        assert!(engine.is_complete());
        assert!(!engine.is_active());
        assert_eq!(engine.device().state().rhythm_type, RhythmType::Asystole);
        assert_eq!(engine.runtime().completed.len(), 2);
        assert_eq!(engine.runtime().completed[1].completed_at_ms, 5000);

        engine.advance(3000);
        assert_eq!(engine.device().state().rhythm_type, RhythmType::Sinus);
    }

    #[test]
    fn test_state_condition_already_true_at_start() {
        let mut engine = ScenarioEngine::default();
        let mut config = scenario(TWO_STEPS);
        config.initial_state.display_mode = Some(DisplayMode::Manuel);
        engine.start_scenario(config).unwrap();
        assert_eq!(engine.runtime().current_step_index, 1);
    }

    #[test]
    fn test_constraint_failure_stops_run() {
        let yaml = r#"
id: constrained
steps:
  - step: 0
    validation: { type: event, event: shockDelivered }
    constraints:
      - property: rhythmType
        mustNotBe: fibrillationVentriculaire
        failMessage: X
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        engine.act(|d| d.set_rhythm(RhythmType::FibrillationVentriculaire));
        assert_eq!(engine.failure_message(), Some("X"));
        assert!(!engine.is_active());
        assert!(!engine.is_complete());
    }

    #[test]
    fn test_timeout_step() {
        let yaml = r#"
id: wait
steps:
  - step: 0
    validation: { type: timeout, duration: 10000 }
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        assert_eq!(engine.pending_timers(), 1);
        engine.advance(9999);
        assert!(engine.is_active());
        engine.advance(1);
        assert!(engine.is_complete());
        assert_eq!(
            engine.device().state().last_event.as_deref(),
            Some("timeoutCompleted")
        );
    }

    #[test]
    fn test_one_timer_per_distinct_duration() {
        let yaml = r#"
id: race
steps:
  - step: 0
    validation:
      any_of:
        - { type: timeout, duration: 4000 }
        - all_of:
            - { type: timeout, duration: 4000 }
            - { type: timeout, duration: 8000 }
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        assert_eq!(engine.pending_timers(), 2);
        engine.advance(4000);
        assert!(engine.is_complete());
        assert_eq!(engine.pending_timers(), 0);
    }

    #[test]
    fn test_stop_cancels_timers() {
        let yaml = r#"
id: stop
steps:
  - step: 0
    validation: { type: stateChange, property: displayMode, value: DAE }
    onComplete:
      - set: { rhythmType: asystole }
        delayMs: 2000
  - step: 1
    validation: { type: timeout, duration: 5000 }
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        engine.dispatch(&DeviceAction::SetDisplayMode {
            mode: DisplayMode::Dae,
        });
        assert_eq!(engine.pending_timers(), 2);
        engine.stop_scenario();
        assert_eq!(engine.pending_timers(), 0);
        engine.advance(10_000);
        assert_eq!(engine.device().state().rhythm_type, RhythmType::Sinus);
        assert_eq!(engine.device().events().count_named("timeoutCompleted"), 0);
        assert!(!engine.is_complete());
    }

    #[test]
    fn test_stop_forgets_the_run() {
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(TWO_STEPS)).unwrap();
        engine.act(|d| d.set_display_mode(DisplayMode::Manuel));
        assert_eq!(engine.runtime().current_step_index, 1);

        engine.stop_scenario();
        assert!(engine.config().is_none());
        assert!(engine.current_step().is_none());
        assert_eq!(engine.runtime(), &ScenarioRuntime::default());
        // The device is left as the trainee set it.
        assert_eq!(engine.device().state().display_mode, DisplayMode::Manuel);
    }

    #[test]
    fn test_charge_progress_step_completes_mid_ramp() {
        let yaml = r#"
id: half-charged
initialState: { displayMode: Manuel }
steps:
  - step: 0
    validation: { type: stateChange, property: chargeProgress, value: 50 }
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        engine.dispatch(&DeviceAction::StartCharging);
        engine.advance(2400);
        assert!(engine.is_active());
        engine.advance(100);
        assert_eq!(engine.device().state().charge_progress, 50);
        assert!(engine.is_complete());
        assert_eq!(engine.runtime().completed[0].completed_at_ms, 2500);
    }

    #[test]
    fn test_constraint_checked_on_charge_tick() {
        let yaml = r#"
id: no-half
initialState: { displayMode: Manuel }
steps:
  - step: 0
    validation: { type: event, event: shockDelivered }
    constraints:
      - property: chargeProgress
        mustNotBe: 50
        failMessage: Charge reached half
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        engine.dispatch(&DeviceAction::StartCharging);
        engine.advance(2500);
        assert_eq!(engine.failure_message(), Some("Charge reached half"));
        assert!(!engine.is_active());
    }

    #[test]
    fn test_button_release_is_observed() {
        let yaml = r#"
id: release
initialState: { displayMode: Manuel }
steps:
  - step: 0
    validation: { type: stateChange, property: isChargeButtonPressed, value: true }
  - step: 1
    validation: { type: stateChange, property: isChargeButtonPressed, value: false }
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        engine.dispatch(&DeviceAction::StartCharging);
        assert_eq!(engine.runtime().current_step_index, 1);
        engine.advance(1000);
        assert!(engine.is_complete());
    }

    #[test]
    fn test_setup_leaves_no_last_event() {
        let yaml = r#"
id: setup
initialState: { heartRate: 170, rhythmType: tachycardieVentriculaire }
steps:
  - step: 0
    validation: { type: event, event: shockDelivered }
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        assert_eq!(engine.device().state().heart_rate, 170);
        assert_eq!(engine.device().state().last_event, None);
    }

    #[test]
    fn test_restart_resets_device_and_runtime() {
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(TWO_STEPS)).unwrap();
        engine.act(|d| d.set_display_mode(DisplayMode::Manuel));
        engine.dispatch(&DeviceAction::StartCharging);
        engine.start_scenario(scenario(TWO_STEPS)).unwrap();
        assert_eq!(engine.runtime().current_step_index, 0);
        assert!(engine.runtime().completed.is_empty());
        engine.advance(10_000);
        assert!(!engine.device().state().is_charged);
        assert_eq!(engine.device().state().display_mode, DisplayMode::Arret);
    }

    #[test]
    fn test_two_events_from_one_action_both_seen() {
        // Selecting an energy outside Manuel records the energy event and the
        // mode change in one call.
        let yaml = r#"
id: both
steps:
  - step: 0
    validation: { type: event, event: manualEnergySetTo_200 }
  - step: 1
    validation: { type: event, event: displayModeSetTo_Manuel }
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        engine.act(|d| d.set_display_mode(DisplayMode::Moniteur));
        engine.act(|d| d.set_manual_energy("200"));
        assert!(engine.is_complete());
    }

    #[test]
    fn test_event_condition_is_one_shot() {
        let yaml = r#"
id: twice
steps:
  - step: 0
    validation: { type: event, event: chargeStarted }
  - step: 1
    validation: { type: event, event: chargeStarted }
"#;
        let mut engine = ScenarioEngine::default();
        engine.start_scenario(scenario(yaml)).unwrap();
        engine.act(|d| d.set_display_mode(DisplayMode::Manuel));
        engine.dispatch(&DeviceAction::StartCharging);
        assert_eq!(engine.runtime().current_step_index, 1);
        // The same event is not re-read for step 1.
        engine.advance(100);
        assert_eq!(engine.runtime().current_step_index, 1);
        engine.advance(5000);
        engine.dispatch(&DeviceAction::CancelCharge);
        engine.dispatch(&DeviceAction::StartCharging);
        assert!(engine.is_complete());
    }

    #[test]
    fn test_invalid_document_rejected_at_start() {
        let config = ScenarioConfig {
            id: "empty".into(),
            title: String::new(),
            description: String::new(),
            initial_state: DeviceStatePatch::default(),
            steps: Vec::new(),
        };
        let mut engine = ScenarioEngine::default();
        assert_eq!(
            engine.start_scenario(config).unwrap_err(),
            ScenarioError::NoSteps
        );
        assert!(!engine.is_active());
    }
}
