//! Inbound device operations as data.
//!
//! One variant per operation the presentation layer may invoke. Scripts and
//! the CLI console serialize these; [`Defibrillator::dispatch`] applies them.
//!
//! [`Defibrillator::dispatch`]: super::Defibrillator::dispatch

use super::state::{DisplayMode, PacerMode, RhythmType};
use serde::{Deserialize, Serialize};

/// A single front-panel input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum DeviceAction {
    SetDisplayMode { mode: DisplayMode },
    SetManualEnergy { energy: String },
    ToggleSynchroMode,
    StartCharging,
    DeliverShock,
    CancelCharge,
    SetPacerFrequency { frequency: u16 },
    SetPacerIntensity { intensity: u16 },
    SetPacerMode { mode: PacerMode },
    ToggleIsPacing,
    SetRhythm { rhythm: RhythmType },
    SetHeartRate { bpm: u16 },
    AnalyzeRhythm,
    ResetState,
}

impl DeviceAction {
    /// Short label for logs and reports
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::SetDisplayMode { mode } => format!("mode {mode}"),
            Self::SetManualEnergy { energy } => format!("energy {energy}"),
            Self::ToggleSynchroMode => "synchro".to_string(),
            Self::StartCharging => "charge".to_string(),
            Self::DeliverShock => "shock".to_string(),
            Self::CancelCharge => "cancel".to_string(),
            Self::SetPacerFrequency { frequency } => format!("pacer frequency {frequency}"),
            Self::SetPacerIntensity { intensity } => format!("pacer intensity {intensity}"),
            Self::SetPacerMode { mode } => format!("pacer mode {mode}"),
            Self::ToggleIsPacing => "pace".to_string(),
            Self::SetRhythm { rhythm } => format!("rhythm {rhythm}"),
            Self::SetHeartRate { bpm } => format!("heart rate {bpm}"),
            Self::AnalyzeRhythm => "analyze".to_string(),
            Self::ResetState => "reset".to_string(),
        }
    }
}
