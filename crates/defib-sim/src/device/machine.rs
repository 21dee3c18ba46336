//! The defibrillator state machine.
//!
//! [`Defibrillator`] owns the [`DeviceState`], the event log and every timer
//! the device runs (charge ramp, button pulses, synchronized shock). All
//! mutation goes through its action methods; each one applies its whole
//! update before returning, so observers never see a half-applied transition.
//!
//! Guard rejections (charging twice, shocking without charge, ...) are silent
//! no-ops, the way a physical button is inert in the wrong state. They are
//! logged at `debug` level only.

use super::action::DeviceAction;
use super::event::{DeviceEvent, EventLog};
use super::state::{
    clamp_to, is_energy_level, DeviceState, DeviceStatePatch, DisplayMode, PacerMode,
    RhythmType, HEART_RATE_BOUNDS, PACER_FREQUENCY_BOUNDS, PACER_INTENSITY_BOUNDS,
};
use crate::clock::SimClock;
use crate::config::DeviceTiming;
use crate::scheduler::{Scheduler, TaskHandle};
use tracing::{debug, info};

/// Timer payloads owned by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceTask {
    ChargeTick,
    ReleaseChargeButton,
    ReleaseShockButton,
    SynchronizedShock,
}

/// Simulated defibrillator/monitor.
#[derive(Debug)]
pub struct Defibrillator {
    state: DeviceState,
    timing: DeviceTiming,
    clock: SimClock,
    timers: Scheduler<DeviceTask>,
    events: EventLog,
    charge_ramp: Option<TaskHandle>,
    charge_pulse: Option<TaskHandle>,
    shock_pulse: Option<TaskHandle>,
    pending_shock: Option<TaskHandle>,
}

impl Default for Defibrillator {
    fn default() -> Self {
        Self::new(DeviceTiming::default())
    }
}

impl Defibrillator {
    /// Create a powered-off device.
    #[must_use]
    pub fn new(timing: DeviceTiming) -> Self {
        Self {
            state: DeviceState::default(),
            timing,
            clock: SimClock::new(),
            timers: Scheduler::new(),
            events: EventLog::new(),
            charge_ramp: None,
            charge_pulse: None,
            shock_pulse: None,
            pending_shock: None,
        }
    }

    /// Current state (read-only)
    #[must_use]
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Timing constants in use
    #[must_use]
    pub fn timing(&self) -> &DeviceTiming {
        &self.timing
    }

    /// Event log
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Current virtual time
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Number of device timers still pending
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Whether a synchronized shock is waiting for its sync window
    #[must_use]
    pub fn is_shock_pending(&self) -> bool {
        self.pending_shock.is_some()
    }

    // =========================================================================
    // Mode and settings
    // =========================================================================

    /// Turn the rotary switch.
    ///
    /// ARRET performs a full reset. Stimulateur forces synchro mode on, since
    /// the pacer needs the sync detector.
    pub fn set_display_mode(&mut self, mode: DisplayMode) -> bool {
        if mode == DisplayMode::Arret {
            self.reset_state();
            return true;
        }
        self.state.display_mode = mode;
        if mode == DisplayMode::Stimulateur {
            self.state.is_synchro_mode = true;
        }
        self.record(DeviceEvent::DisplayModeSet(mode));
        true
    }

    /// Select an energy level, switching to Manuel if needed.
    pub fn set_manual_energy(&mut self, label: &str) -> bool {
        self.set_manual_energy_with(label, |device, mode| {
            device.set_display_mode(mode);
        })
    }

    /// Select an energy level; if the device isn't in Manuel,
    /// `on_mode_change` is called with [`DisplayMode::Manuel`] so the caller
    /// can perform (or delay) the switch.
    pub fn set_manual_energy_with<F>(&mut self, label: &str, on_mode_change: F) -> bool
    where
        F: FnOnce(&mut Self, DisplayMode),
    {
        if !is_energy_level(label) {
            debug!(label, "ignoring unknown energy level");
            return false;
        }
        self.state.manual_energy = label.to_string();
        self.record(DeviceEvent::ManualEnergySet(label.to_string()));
        if self.state.display_mode != DisplayMode::Manuel {
            on_mode_change(self, DisplayMode::Manuel);
        }
        true
    }

    /// Flip synchronized (cardioversion) mode.
    pub fn toggle_synchro_mode(&mut self) -> bool {
        self.set_synchro_mode(!self.state.is_synchro_mode);
        true
    }

    fn set_synchro_mode(&mut self, active: bool) {
        self.state.is_synchro_mode = active;
        self.record(DeviceEvent::SynchroModeToggled { active });
    }

    // =========================================================================
    // Charge and shock
    // =========================================================================

    /// Begin charging the capacitor.
    ///
    /// Rejected while a charge is in progress or already complete; a second
    /// press never starts a second ramp.
    pub fn start_charging(&mut self) -> bool {
        if self.state.is_charging || self.state.is_charged {
            debug!(
                charging = self.state.is_charging,
                charged = self.state.is_charged,
                "charge request ignored"
            );
            return false;
        }

        self.state.is_charge_button_pressed = true;
        let now = self.now_ms();
        self.timers.cancel_slot(&mut self.charge_pulse);
        self.charge_pulse = Some(self.timers.schedule_after(
            now,
            self.timing.charge_button_pulse_ms,
            DeviceTask::ReleaseChargeButton,
        ));

        self.state.is_charging = true;
        self.state.charge_progress = 0;
        self.state.is_charged = false;
        self.record(DeviceEvent::ChargeStarted);

        self.timers.cancel_slot(&mut self.charge_ramp);
        self.charge_ramp = Some(self.timers.schedule_every(
            now,
            self.timing.charge_interval_ms,
            DeviceTask::ChargeTick,
        ));
        true
    }

    fn on_charge_tick(&mut self) {
        if !self.state.is_charging {
            self.timers.cancel_slot(&mut self.charge_ramp);
            return;
        }
        let next = self
            .state
            .charge_progress
            .saturating_add(self.timing.charge_increment)
            .min(100);
        self.state.charge_progress = next;
        if next == 100 {
            self.timers.cancel_slot(&mut self.charge_ramp);
            self.state.is_charging = false;
            self.state.is_charged = true;
            self.state.is_shock_button_blinking = true;
            self.record(DeviceEvent::ChargeCompleted);
        }
    }

    /// Press the shock button.
    ///
    /// Without a completed charge nothing happens. In synchro mode delivery
    /// waits `synchro_delay_ms` for the sync window; the deferred delivery
    /// re-checks that the device is still charged when it fires.
    pub fn deliver_shock(&mut self) -> bool {
        if !self.state.is_charged {
            debug!("shock ignored: not charged");
            return false;
        }
        if self.pending_shock.is_some() {
            debug!("shock ignored: synchronized delivery already pending");
            return false;
        }

        self.state.is_shock_button_pressed = true;
        let now = self.now_ms();
        self.timers.cancel_slot(&mut self.shock_pulse);
        self.shock_pulse = Some(self.timers.schedule_after(
            now,
            self.timing.shock_button_pulse_ms,
            DeviceTask::ReleaseShockButton,
        ));

        if self.state.is_synchro_mode {
            self.state.is_shock_button_blinking = true;
            self.pending_shock = Some(self.timers.schedule_after(
                now,
                self.timing.synchro_delay_ms,
                DeviceTask::SynchronizedShock,
            ));
            debug!(delay_ms = self.timing.synchro_delay_ms, "synchronized shock armed");
        } else {
            self.execute_shock();
        }
        true
    }

    fn execute_shock(&mut self) {
        if !self.state.is_charged {
            debug!("shock discharge skipped: charge no longer present");
            return;
        }
        self.state.shock_count += 1;
        self.state.is_charged = false;
        self.state.charge_progress = 0;
        self.state.is_shock_button_blinking = false;
        info!(count = self.state.shock_count, "shock delivered");
        self.record(DeviceEvent::ShockDelivered {
            count: self.state.shock_count,
        });
    }

    /// Disarm a completed charge. Returns whether anything was disarmed.
    pub fn cancel_charge(&mut self) -> bool {
        if !(self.state.is_charged && self.state.charge_progress == 100) {
            return false;
        }
        self.timers.cancel_slot(&mut self.pending_shock);
        self.state.is_charged = false;
        self.state.is_charging = false;
        self.state.charge_progress = 0;
        self.state.is_shock_button_blinking = false;
        self.record(DeviceEvent::ChargeCanceled);
        true
    }

    // =========================================================================
    // Pacer
    // =========================================================================

    /// Set pacer frequency, clamped to 30..=200.
    pub fn set_pacer_frequency(&mut self, frequency: u16) -> bool {
        let frequency = clamp_to(frequency, &PACER_FREQUENCY_BOUNDS);
        self.state.pacer_frequency = frequency;
        self.record(DeviceEvent::PacerFrequencySet(frequency));
        true
    }

    /// Set pacer intensity, clamped to 5..=200 mA.
    pub fn set_pacer_intensity(&mut self, intensity: u16) -> bool {
        let intensity = clamp_to(intensity, &PACER_INTENSITY_BOUNDS);
        self.state.pacer_intensity = intensity;
        self.record(DeviceEvent::PacerIntensitySet(intensity));
        true
    }

    /// Select fixed or on-demand pacing.
    pub fn set_pacer_mode(&mut self, mode: PacerMode) -> bool {
        self.state.pacer_mode = mode;
        self.record(DeviceEvent::PacerModeSet(mode));
        true
    }

    /// Start or stop pacing.
    pub fn toggle_is_pacing(&mut self) -> bool {
        self.set_pacing(!self.state.is_pacing);
        true
    }

    fn set_pacing(&mut self, active: bool) {
        self.state.is_pacing = active;
        self.record(DeviceEvent::PacingToggled { active });
    }

    // =========================================================================
    // Patient rhythm
    // =========================================================================

    /// Change the patient's underlying rhythm.
    pub fn set_rhythm(&mut self, rhythm: RhythmType) -> bool {
        self.state.rhythm_type = rhythm;
        self.record(DeviceEvent::RhythmSet(rhythm));
        true
    }

    /// Set heart rate, clamped to 30..=170 bpm.
    pub fn set_heart_rate(&mut self, bpm: u16) -> bool {
        let bpm = clamp_to(bpm, &HEART_RATE_BOUNDS);
        self.state.heart_rate = bpm;
        self.record(DeviceEvent::HeartRateSet(bpm));
        true
    }

    /// Run the DAE rhythm analysis. Only available in DAE mode.
    ///
    /// Returns `Some(shockable)` when an analysis ran.
    pub fn analyze_rhythm(&mut self) -> Option<bool> {
        if self.state.display_mode != DisplayMode::Dae {
            debug!(mode = %self.state.display_mode, "analysis ignored outside DAE");
            return None;
        }
        let shockable = self.state.rhythm_type.is_shockable();
        self.record(DeviceEvent::RhythmAnalyzed { shockable });
        Some(shockable)
    }

    /// Apply a partial state through the regular setters (clamping, events).
    ///
    /// The mode goes first so that an explicit `isSynchroMode` in the same
    /// patch wins over the Stimulateur default.
    pub fn apply_patch(&mut self, patch: &DeviceStatePatch) {
        if let Some(mode) = patch.display_mode {
            self.set_display_mode(mode);
        }
        if let Some(label) = &patch.manual_energy {
            if is_energy_level(label) {
                self.state.manual_energy.clone_from(label);
                self.record(DeviceEvent::ManualEnergySet(label.clone()));
            } else {
                debug!(label = %label, "patch energy level ignored");
            }
        }
        if let Some(rhythm) = patch.rhythm_type {
            self.set_rhythm(rhythm);
        }
        if let Some(bpm) = patch.heart_rate {
            self.set_heart_rate(bpm);
        }
        if let Some(frequency) = patch.pacer_frequency {
            self.set_pacer_frequency(frequency);
        }
        if let Some(intensity) = patch.pacer_intensity {
            self.set_pacer_intensity(intensity);
        }
        if let Some(mode) = patch.pacer_mode {
            self.set_pacer_mode(mode);
        }
        if let Some(active) = patch.is_pacing {
            if active != self.state.is_pacing {
                self.set_pacing(active);
            }
        }
        if let Some(active) = patch.is_synchro_mode {
            if active != self.state.is_synchro_mode {
                self.set_synchro_mode(active);
            }
        }
    }

    /// Cancel every timer and restore the initial state verbatim.
    pub fn reset_state(&mut self) {
        let cancelled = self.timers.clear();
        self.charge_ramp = None;
        self.charge_pulse = None;
        self.shock_pulse = None;
        self.pending_shock = None;
        self.state = DeviceState::default();
        // Logged for observers; the state's lastEvent stays cleared.
        self.events.record(self.now_ms(), DeviceEvent::StateReset);
        debug!(cancelled, "device reset");
    }

    /// Apply one inbound action. Returns whether the device accepted it.
    pub fn dispatch(&mut self, action: &DeviceAction) -> bool {
        match action {
            DeviceAction::SetDisplayMode { mode } => self.set_display_mode(*mode),
            DeviceAction::SetManualEnergy { energy } => self.set_manual_energy(energy),
            DeviceAction::ToggleSynchroMode => self.toggle_synchro_mode(),
            DeviceAction::StartCharging => self.start_charging(),
            DeviceAction::DeliverShock => self.deliver_shock(),
            DeviceAction::CancelCharge => self.cancel_charge(),
            DeviceAction::SetPacerFrequency { frequency } => self.set_pacer_frequency(*frequency),
            DeviceAction::SetPacerIntensity { intensity } => self.set_pacer_intensity(*intensity),
            DeviceAction::SetPacerMode { mode } => self.set_pacer_mode(*mode),
            DeviceAction::ToggleIsPacing => self.toggle_is_pacing(),
            DeviceAction::SetRhythm { rhythm } => self.set_rhythm(*rhythm),
            DeviceAction::SetHeartRate { bpm } => self.set_heart_rate(*bpm),
            DeviceAction::AnalyzeRhythm => self.analyze_rhythm().is_some(),
            DeviceAction::ResetState => {
                self.reset_state();
                true
            }
        }
    }

    /// Forget the last event name. The event log is untouched.
    pub fn clear_last_event(&mut self) {
        self.state.last_event = None;
    }

    /// Record an event and mirror its name into `lastEvent`.
    pub(crate) fn record(&mut self, event: DeviceEvent) {
        self.state.last_event = Some(event.name());
        self.events.record(self.clock.now_ms(), event);
    }

    // =========================================================================
    // Time
    // =========================================================================

    /// Due time of the next device timer
    #[must_use]
    pub fn next_due(&self) -> Option<u64> {
        self.timers.next_due()
    }

    /// Fire the earliest timer due at or before `limit_ms`, moving the clock
    /// to its due time. Returns false when nothing was due.
    pub fn step_until(&mut self, limit_ms: u64) -> bool {
        let Some(fired) = self.timers.pop_due(limit_ms) else {
            return false;
        };
        self.clock.advance_to(fired.due_ms);
        match fired.task {
            DeviceTask::ChargeTick => self.on_charge_tick(),
            DeviceTask::ReleaseChargeButton => {
                self.charge_pulse = None;
                self.state.is_charge_button_pressed = false;
            }
            DeviceTask::ReleaseShockButton => {
                self.shock_pulse = None;
                self.state.is_shock_button_pressed = false;
            }
            DeviceTask::SynchronizedShock => {
                self.pending_shock = None;
                self.execute_shock();
            }
        }
        true
    }

    /// Move the clock without firing anything. Earlier times are ignored.
    pub(crate) fn advance_clock_to(&mut self, time_ms: u64) {
        self.clock.advance_to(time_ms);
    }

    /// Run the device forward by `ms` of virtual time.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms().saturating_add(ms);
        while self.step_until(target) {}
        self.clock.advance_to(target);
    }
}
