//! Device state machine.
//!
//! - [`state`]: the observable [`DeviceState`] record and its value types
//! - [`event`]: the append-only [`EventLog`]
//! - [`action`]: inbound [`DeviceAction`]s
//! - [`machine`]: the [`Defibrillator`] that ties them together

pub mod action;
pub mod event;
pub mod machine;
pub mod state;

pub use action::DeviceAction;
pub use event::{DeviceEvent, EventLog, EventRecord};
pub use machine::Defibrillator;
pub use state::{
    energy_joules, is_energy_level, DeviceState, DeviceStatePatch, DisplayMode, PacerMode,
    ParseLabelError, RhythmType, ENERGY_LEVELS, HEART_RATE_BOUNDS, PACER_FREQUENCY_BOUNDS,
    PACER_INTENSITY_BOUNDS,
};
