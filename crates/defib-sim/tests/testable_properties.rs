//! End-to-end checks of the simulator's observable guarantees.
//!
//! Each test drives the public API only: device actions, scenario start/stop
//! and virtual time.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use defib_sim::prelude::*;
use defib_sim::waveform::sample_count;

fn manual_device() -> Defibrillator {
    let mut device = Defibrillator::default();
    device.set_display_mode(DisplayMode::Manuel);
    device
}

fn charged_device() -> Defibrillator {
    let mut device = manual_device();
    device.start_charging();
    device.advance(device.timing().full_charge_ms());
    assert!(device.state().is_charged);
    device
}

// ============================================================================
// Waveform
// ============================================================================

#[test]
fn rhythm_data_has_canonical_length_for_every_rhythm() {
    for rhythm in RhythmType::ALL {
        for heart_rate in [30, 70, 170] {
            let samples = get_rhythm_data(rhythm, heart_rate);
            assert_eq!(samples.len(), sample_count(10.0, 250), "{rhythm} @ {heart_rate}");
        }
    }
}

#[test]
fn seamless_loop_shrinks_head_tail_gap() {
    for rhythm in RhythmType::ALL {
        let mut samples = generate(rhythm, 75, 10.0, 250);
        let before = (samples[0] - samples[samples.len() - 1]).abs();
        create_seamless_loop(&mut samples, 200, 250);
        let after = (samples[0] - samples[samples.len() - 1]).abs();
        assert!(after <= before, "{rhythm}");
        if before > 0.0 {
            assert!(after < before, "{rhythm}");
        }
    }
}

#[test]
fn generator_is_reproducible_from_config_seed() {
    let config = WaveformConfig {
        seed: 99,
        ..WaveformConfig::default()
    };
    let mut a = WaveformGenerator::new(config);
    let mut b = WaveformGenerator::new(config);
    for rhythm in RhythmType::ALL {
        assert_eq!(a.rhythm_data(rhythm, 90), b.rhythm_data(rhythm, 90));
    }
}

// ============================================================================
// Device state machine
// ============================================================================

#[test]
fn double_start_charging_ramps_once() {
    let mut device = manual_device();
    assert!(device.start_charging());
    device.advance(700);
    assert!(!device.start_charging());

    let mut last = device.state().charge_progress;
    let mut steps = Vec::new();
    while !device.state().is_charged {
        device.advance(100);
        let progress = device.state().charge_progress;
        assert!(progress >= last);
        steps.push(progress - last);
        last = progress;
    }
    // One ramp: never more than one increment per interval.
    assert!(steps.iter().all(|&step| step <= device.timing().charge_increment));
    assert_eq!(device.events().count_named("chargeStarted"), 1);
    assert_eq!(device.events().count_named("chargeCompleted"), 1);
}

#[test]
fn shock_without_completed_charge_is_ignored() {
    let mut device = manual_device();
    device.deliver_shock();
    assert_eq!(device.state().shock_count, 0);

    device.start_charging();
    device.advance(2000);
    device.deliver_shock();
    assert_eq!(device.state().shock_count, 0);
    assert_eq!(device.events().count_named("shockDelivered"), 0);
}

#[test]
fn cancel_charge_succeeds_only_when_fully_charged() {
    let mut device = manual_device();
    let before = device.state().clone();
    assert!(!device.cancel_charge());
    assert_eq!(device.state(), &before);

    device.start_charging();
    device.advance(4900);
    let before = device.state().clone();
    assert!(!device.cancel_charge());
    assert_eq!(device.state(), &before);

    device.advance(100);
    assert_eq!(device.state().charge_progress, 100);
    assert!(device.cancel_charge());
    assert!(!device.state().is_charged);
}

#[test]
fn arret_restores_initial_state() {
    let mut device = charged_device();
    device.set_pacer_intensity(120);
    device.toggle_is_pacing();
    device.set_heart_rate(150);
    device.set_display_mode(DisplayMode::Arret);
    assert_eq!(device.state(), &DeviceState::default());
}

#[test]
fn synchronized_shock_waits_for_delay() {
    let mut device = charged_device();
    device.toggle_synchro_mode();
    assert!(device.state().is_synchro_mode && device.state().is_charged);
    device.deliver_shock();
    assert_eq!(device.state().shock_count, 0);
    device.advance(device.timing().synchro_delay_ms / 2);
    assert_eq!(device.state().shock_count, 0);
    device.advance(device.timing().synchro_delay_ms);
    assert_eq!(device.state().shock_count, 1);
}

#[test]
fn pending_synchronized_shock_is_dead_after_reset_and_cancel() {
    let mut device = charged_device();
    device.toggle_synchro_mode();
    device.deliver_shock();
    device.reset_state();
    device.advance(10_000);
    assert_eq!(device.state().shock_count, 0);

    let mut device = charged_device();
    device.toggle_synchro_mode();
    device.deliver_shock();
    device.cancel_charge();
    device.advance(10_000);
    assert_eq!(device.state().shock_count, 0);
}

#[test]
fn custom_timing_is_honoured() {
    let timing = DeviceTiming {
        charge_increment: 10,
        charge_interval_ms: 50,
        synchro_delay_ms: 800,
        ..DeviceTiming::default()
    };
    let mut device = Defibrillator::new(timing);
    device.set_display_mode(DisplayMode::Manuel);
    device.start_charging();
    device.advance(450);
    assert!(!device.state().is_charged);
    device.advance(50);
    assert!(device.state().is_charged);
    device.toggle_synchro_mode();
    device.deliver_shock();
    device.advance(800);
    assert_eq!(device.state().shock_count, 1);
}

// ============================================================================
// Scenario engine
// ============================================================================

const MODE_THEN_SHOCK: &str = r#"{
  "id": "mode-then-shock",
  "steps": [
    { "step": 0, "validation": { "type": "stateChange", "property": "displayMode", "value": "Manuel" } },
    { "step": 1, "validation": { "type": "event", "event": "shockDelivered" } }
  ]
}"#;

#[test]
fn mode_then_shock_scenario_completes_with_one_shock() {
    let config = ScenarioConfig::from_json(MODE_THEN_SHOCK).unwrap();
    let mut engine = ScenarioEngine::default();
    engine.start_scenario(config).unwrap();

    engine.dispatch(&DeviceAction::SetDisplayMode {
        mode: DisplayMode::Manuel,
    });
    assert_eq!(engine.runtime().current_step_index, 1);
    engine.dispatch(&DeviceAction::StartCharging);
    let full_charge = engine.device().timing().full_charge_ms();
    engine.advance(full_charge);
    assert!(!engine.is_complete());
    engine.dispatch(&DeviceAction::DeliverShock);

    assert!(engine.is_complete());
    assert!(!engine.is_active());
    assert_eq!(engine.failure_message(), None);
    assert_eq!(engine.device().state().shock_count, 1);
}

#[test]
fn constraint_violation_sets_failure_message() {
    let config = ScenarioConfig::from_yaml(
        r#"
id: constraint
steps:
  - step: 0
    validation: { type: event, event: chargeCompleted }
    constraints:
      - { property: rhythmType, mustNotBe: fibrillationVentriculaire, failMessage: X }
"#,
    )
    .unwrap();
    let mut engine = ScenarioEngine::default();
    engine.start_scenario(config).unwrap();
    engine.dispatch(&DeviceAction::SetRhythm {
        rhythm: RhythmType::FibrillationVentriculaire,
    });
    assert_eq!(engine.failure_message(), Some("X"));
    assert!(!engine.is_active());
}

#[test]
fn stopping_scenario_cancels_its_timers() {
    let config = ScenarioConfig::from_yaml(
        r#"
id: stop
steps:
  - step: 0
    validation: { type: stateChange, property: displayMode, value: Moniteur }
    onComplete:
      - { set: { heartRate: 40 }, delayMs: 1000 }
  - step: 1
    validation: { type: timeout, duration: 2000 }
"#,
    )
    .unwrap();
    let mut engine = ScenarioEngine::default();
    engine.start_scenario(config).unwrap();
    engine.dispatch(&DeviceAction::SetDisplayMode {
        mode: DisplayMode::Moniteur,
    });
    engine.stop_scenario();
    assert!(engine.config().is_none());
    assert_eq!(engine.runtime().current_step_index, 0);
    assert!(engine.runtime().completed.is_empty());
    engine.advance(5000);
    assert_eq!(engine.device().state().heart_rate, 70);
    assert!(!engine.is_complete());
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn power_off_during_cardioversion_scenario_never_shocks() {
    let mut engine = ScenarioEngine::default();
    engine
        .start_scenario(builtin("af-cardioversion").unwrap().config().unwrap())
        .unwrap();
    engine.dispatch(&DeviceAction::SetDisplayMode {
        mode: DisplayMode::Manuel,
    });
    engine.dispatch(&DeviceAction::ToggleSynchroMode);
    engine.dispatch(&DeviceAction::StartCharging);
    engine.advance(5000);
    engine.dispatch(&DeviceAction::DeliverShock);
    engine.dispatch(&DeviceAction::SetDisplayMode {
        mode: DisplayMode::Arret,
    });
    engine.advance(20_000);
    assert_eq!(engine.device().state().shock_count, 0);
    assert_eq!(engine.device().state(), &DeviceState::default());
}

#[test]
fn runtime_serializes_for_front_ends() {
    let mut engine = ScenarioEngine::default();
    engine
        .start_scenario(builtin("dae-vf").unwrap().config().unwrap())
        .unwrap();
    let json = serde_json::to_value(engine.runtime()).unwrap();
    assert_eq!(json["currentStepIndex"], 0);
    assert_eq!(json["isActive"], true);
    assert_eq!(json["failureMessage"], serde_json::Value::Null);
}
