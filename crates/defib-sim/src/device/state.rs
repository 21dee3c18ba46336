//! DeviceState record and its value types.
//!
//! Property names serialize in camelCase; those names are the vocabulary
//! scenario documents use in `stateChange` conditions and constraints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Heart rate bounds for manual rhythm control (bpm)
pub const HEART_RATE_BOUNDS: RangeInclusive<u16> = 30..=170;
/// Pacer frequency bounds (pulses per minute)
pub const PACER_FREQUENCY_BOUNDS: RangeInclusive<u16> = 30..=200;
/// Pacer intensity bounds (mA)
pub const PACER_INTENSITY_BOUNDS: RangeInclusive<u16> = 5..=200;

/// Front-panel energy selector positions, lowest first.
pub const ENERGY_LEVELS: [&str; 11] = [
    "1-10", "15", "20", "30", "50", "70", "100", "120", "150", "170", "200",
];

/// Whether `label` is a selectable energy position
#[must_use]
pub fn is_energy_level(label: &str) -> bool {
    ENERGY_LEVELS.contains(&label)
}

/// Upper joule value of an energy position
#[must_use]
pub fn energy_joules(label: &str) -> Option<u16> {
    if !is_energy_level(label) {
        return None;
    }
    label.rsplit('-').next().and_then(|j| j.parse().ok())
}

pub(crate) fn clamp_to(value: u16, bounds: &RangeInclusive<u16>) -> u16 {
    value.clamp(*bounds.start(), *bounds.end())
}

/// A label that does not name any variant of a device enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

impl ParseLabelError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Operating mode selected on the rotary switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Automated external defibrillation
    #[serde(rename = "DAE")]
    Dae,
    /// Off; selecting it resets the device
    #[default]
    #[serde(rename = "ARRET")]
    Arret,
    /// Monitoring only
    Moniteur,
    /// External pacing
    Stimulateur,
    /// Manual defibrillation
    Manuel,
}

impl DisplayMode {
    /// All modes in switch order
    pub const ALL: [Self; 5] = [
        Self::Arret,
        Self::Dae,
        Self::Moniteur,
        Self::Stimulateur,
        Self::Manuel,
    ];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dae => "DAE",
            Self::Arret => "ARRET",
            Self::Moniteur => "Moniteur",
            Self::Stimulateur => "Stimulateur",
            Self::Manuel => "Manuel",
        }
    }

    /// Every mode except ARRET
    #[must_use]
    pub const fn is_powered(self) -> bool {
        !matches!(self, Self::Arret)
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseLabelError::new("display mode", s))
    }
}

/// Simulated cardiac rhythm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RhythmType {
    /// Normal sinus rhythm
    #[default]
    Sinus,
    /// Ventricular fibrillation
    FibrillationVentriculaire,
    /// Ventricular tachycardia
    TachycardieVentriculaire,
    /// No electrical activity
    Asystole,
    /// Atrial fibrillation
    FibrillationAtriale,
    /// First-degree AV block
    Bav1,
    /// Complete (third-degree) AV block
    Bav3,
    /// Paced rhythm with capture
    ElectroEntrainement,
    /// Post-shock trace
    Choc,
}

impl RhythmType {
    /// All rhythms
    pub const ALL: [Self; 9] = [
        Self::Sinus,
        Self::FibrillationVentriculaire,
        Self::TachycardieVentriculaire,
        Self::Asystole,
        Self::FibrillationAtriale,
        Self::Bav1,
        Self::Bav3,
        Self::ElectroEntrainement,
        Self::Choc,
    ];

    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sinus => "sinus",
            Self::FibrillationVentriculaire => "fibrillationVentriculaire",
            Self::TachycardieVentriculaire => "tachycardieVentriculaire",
            Self::Asystole => "asystole",
            Self::FibrillationAtriale => "fibrillationAtriale",
            Self::Bav1 => "bav1",
            Self::Bav3 => "bav3",
            Self::ElectroEntrainement => "electroEntrainement",
            Self::Choc => "choc",
        }
    }

    /// Rhythms a DAE analysis treats as shockable
    #[must_use]
    pub const fn is_shockable(self) -> bool {
        matches!(
            self,
            Self::FibrillationVentriculaire | Self::TachycardieVentriculaire
        )
    }

    /// Rhythms that produce a palpable pulse (and a pleth wave)
    #[must_use]
    pub const fn is_perfusing(self) -> bool {
        !matches!(
            self,
            Self::FibrillationVentriculaire | Self::Asystole | Self::Choc
        )
    }

    /// Rhythms synthesized beat by beat (the rest come from recordings)
    #[must_use]
    pub const fn is_dynamic(self) -> bool {
        matches!(
            self,
            Self::Sinus | Self::Bav1 | Self::ElectroEntrainement | Self::Choc
        )
    }
}

impl fmt::Display for RhythmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RhythmType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseLabelError::new("rhythm", s))
    }
}

/// Pacer delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PacerMode {
    /// Asynchronous pacing at the set frequency
    #[default]
    Fixe,
    /// Demand pacing: inhibited by intrinsic beats
    Sentinelle,
}

impl PacerMode {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fixe => "Fixe",
            Self::Sentinelle => "Sentinelle",
        }
    }
}

impl fmt::Display for PacerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PacerMode {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Fixe, Self::Sentinelle]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseLabelError::new("pacer mode", s))
    }
}

/// The complete observable state of one simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub display_mode: DisplayMode,
    pub manual_energy: String,
    pub rhythm_type: RhythmType,
    pub heart_rate: u16,

    pub pacer_frequency: u16,
    pub pacer_intensity: u16,
    pub pacer_mode: PacerMode,
    pub is_pacing: bool,

    pub is_charging: bool,
    /// 0..=100, monotonic while charging
    pub charge_progress: u8,
    pub shock_count: u32,
    /// Set only once `charge_progress` reached 100; cleared by shock or cancel
    pub is_charged: bool,

    pub is_charge_button_pressed: bool,
    pub is_shock_button_pressed: bool,
    pub is_shock_button_blinking: bool,

    pub is_synchro_mode: bool,

    /// Name of the most recent event, `None` right after a reset
    pub last_event: Option<String>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::Arret,
            manual_energy: "150".to_string(),
            rhythm_type: RhythmType::Sinus,
            heart_rate: 70,
            pacer_frequency: 70,
            pacer_intensity: 30,
            pacer_mode: PacerMode::Fixe,
            is_pacing: false,
            is_charging: false,
            charge_progress: 0,
            shock_count: 0,
            is_charged: false,
            is_charge_button_pressed: false,
            is_shock_button_pressed: false,
            is_shock_button_blinking: false,
            is_synchro_mode: false,
            last_event: None,
        }
    }
}

impl DeviceState {
    /// Property names as they appear in scenario documents.
    pub const PROPERTY_NAMES: [&'static str; 17] = [
        "displayMode",
        "manualEnergy",
        "rhythmType",
        "heartRate",
        "pacerFrequency",
        "pacerIntensity",
        "pacerMode",
        "isPacing",
        "isCharging",
        "chargeProgress",
        "shockCount",
        "isCharged",
        "isChargeButtonPressed",
        "isShockButtonPressed",
        "isShockButtonBlinking",
        "isSynchroMode",
        "lastEvent",
    ];

    /// Whether `name` is a DeviceState property
    #[must_use]
    pub fn has_property(name: &str) -> bool {
        Self::PROPERTY_NAMES.contains(&name)
    }

    /// JSON view of the record, keyed by property name
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Read one property by its document name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<serde_json::Value> {
        match self.to_json() {
            serde_json::Value::Object(mut map) => map.remove(name),
            _ => None,
        }
    }
}

/// Partial DeviceState used for scenario `initialState` overlays and
/// `onComplete` patches.
///
/// Only operator-settable fields are patchable; charge and shock bookkeeping
/// can only change through the device's own actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeviceStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_mode: Option<DisplayMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_energy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhythm_type: Option<RhythmType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacer_frequency: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacer_intensity: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacer_mode: Option<PacerMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pacing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_synchro_mode: Option<bool>,
}

impl DeviceStatePatch {
    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
