//! Property tests: device invariants under arbitrary front-panel input.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use defib_sim::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Input {
    Press(DeviceAction),
    Wait(u64),
}

fn action_strategy() -> impl Strategy<Value = DeviceAction> {
    prop_oneof![
        proptest::sample::select(DisplayMode::ALL.to_vec())
            .prop_map(|mode| DeviceAction::SetDisplayMode { mode }),
        proptest::sample::select(ENERGY_LEVELS.to_vec()).prop_map(|energy| {
            DeviceAction::SetManualEnergy {
                energy: energy.to_string(),
            }
        }),
        Just(DeviceAction::ToggleSynchroMode),
        Just(DeviceAction::StartCharging),
        Just(DeviceAction::StartCharging),
        Just(DeviceAction::DeliverShock),
        Just(DeviceAction::DeliverShock),
        Just(DeviceAction::CancelCharge),
        (0u16..400).prop_map(|frequency| DeviceAction::SetPacerFrequency { frequency }),
        (0u16..400).prop_map(|intensity| DeviceAction::SetPacerIntensity { intensity }),
        Just(DeviceAction::ToggleIsPacing),
        proptest::sample::select(RhythmType::ALL.to_vec())
            .prop_map(|rhythm| DeviceAction::SetRhythm { rhythm }),
        (0u16..400).prop_map(|bpm| DeviceAction::SetHeartRate { bpm }),
        Just(DeviceAction::AnalyzeRhythm),
    ]
}

fn input_strategy() -> impl Strategy<Value = Input> {
    prop_oneof![
        3 => action_strategy().prop_map(Input::Press),
        1 => (0u64..7000).prop_map(Input::Wait),
    ]
}

fn check_invariants(state: &DeviceState) -> Result<(), TestCaseError> {
    prop_assert!(!(state.is_charged && state.is_charging));
    prop_assert!(state.charge_progress <= 100);
    if state.is_charged {
        prop_assert_eq!(state.charge_progress, 100);
    }
    prop_assert!((30..=170).contains(&state.heart_rate));
    prop_assert!((30..=200).contains(&state.pacer_frequency));
    prop_assert!((5..=200).contains(&state.pacer_intensity));
    prop_assert!(ENERGY_LEVELS.contains(&state.manual_energy.as_str()));
    if state.display_mode == DisplayMode::Arret {
        prop_assert_eq!(state, &DeviceState::default());
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_invariants_hold_under_any_input(inputs in proptest::collection::vec(input_strategy(), 1..60)) {
        let mut device = Defibrillator::default();
        let mut shocks_seen = 0;
        for input in inputs {
            let was_charged = device.state().is_charged;
            match input {
                Input::Press(action) => {
                    device.dispatch(&action);
                }
                Input::Wait(ms) => device.advance(ms),
            }
            let state = device.state();
            check_invariants(state)?;
            // A shock only ever consumes a completed charge.
            if state.shock_count > shocks_seen {
                prop_assert_eq!(state.shock_count, shocks_seen + 1);
                prop_assert!(was_charged);
            }
            shocks_seen = state.shock_count;
        }
    }

    #[test]
    fn prop_event_log_is_ordered(inputs in proptest::collection::vec(input_strategy(), 1..60)) {
        let mut device = Defibrillator::default();
        for input in inputs {
            match input {
                Input::Press(action) => {
                    device.dispatch(&action);
                }
                Input::Wait(ms) => device.advance(ms),
            }
        }
        let records = device.events().records();
        for pair in records.windows(2) {
            prop_assert_eq!(pair[1].seq, pair[0].seq + 1);
            prop_assert!(pair[1].at_ms >= pair[0].at_ms);
        }
    }
}
