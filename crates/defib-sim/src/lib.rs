//! defib-sim: headless core of a defibrillator/monitor training simulator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    DEFIB-SIM Architecture                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌──────────────┐    ┌────────────────┐   │
//! │   │ Scenario   │    │ Defibrillator│    │ Waveform       │   │
//! │   │ Engine     │───►│ state machine│    │ Generator      │   │
//! │   │ (steps)    │◄───│ + event log  │    │ (ECG / pleth)  │   │
//! │   └────────────┘    └──────────────┘    └────────────────┘   │
//! │          │                  │                                │
//! │          └──── Scheduler<T> on a virtual SimClock ───┘       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All time is virtual. Nothing in this crate sleeps or spawns; callers move
//! time forward with [`Defibrillator::advance`] or [`ScenarioEngine::advance`].
//!
//! # Example
//!
//! ```
//! use defib_sim::prelude::*;
//!
//! let mut engine = ScenarioEngine::default();
//! let scenario = builtin("vf-manual-shock").unwrap().config().unwrap();
//! engine.start_scenario(scenario).unwrap();
//!
//! engine.dispatch(&DeviceAction::SetDisplayMode { mode: DisplayMode::Manuel });
//! engine.dispatch(&DeviceAction::SetManualEnergy { energy: "200".into() });
//! engine.dispatch(&DeviceAction::StartCharging);
//! engine.advance(5000);
//! engine.dispatch(&DeviceAction::DeliverShock);
//! engine.advance(3000);
//!
//! assert!(engine.is_complete());
//! assert_eq!(engine.device().state().shock_count, 1);
//! ```

pub mod clock;
pub mod config;
pub mod device;
mod result;
pub mod scenario;
pub mod scheduler;
pub mod waveform;

pub use clock::SimClock;
pub use config::{ConfigError, DeviceTiming, SimConfig, WaveformConfig};
pub use device::{
    Defibrillator, DeviceAction, DeviceEvent, DeviceState, DeviceStatePatch, DisplayMode,
    EventLog, EventRecord, PacerMode, RhythmType,
};
pub use result::{SimError, SimResult};
pub use scenario::{
    builtin, ActionScript, ScenarioConfig, ScenarioEngine, ScenarioError, ScenarioRuntime,
    BUILTIN_SCENARIOS,
};
pub use scheduler::{Scheduler, TaskHandle};
pub use waveform::{
    create_seamless_loop, displayed_rhythm, generate, generate_pleth, get_rhythm_data,
    RecordedTrace, Seed, WaveformGenerator,
};

/// Everything a front end usually needs
pub mod prelude {
    pub use super::config::*;
    pub use super::device::{
        Defibrillator, DeviceAction, DeviceEvent, DeviceState, DeviceStatePatch, DisplayMode,
        EventLog, EventRecord, PacerMode, RhythmType, ENERGY_LEVELS,
    };
    pub use super::result::*;
    pub use super::scenario::{
        builtin, ActionScript, BuiltinScenario, PlaybackSummary, ScenarioConfig,
        ScenarioDiagnostic, ScenarioEngine, ScenarioError, ScenarioRuntime, ScriptStep,
        BUILTIN_SCENARIOS,
    };
    pub use super::waveform::{
        create_seamless_loop, displayed_rhythm, generate, generate_pleth, get_rhythm_data,
        RecordedTrace, WaveformGenerator,
    };
}
