//! Append-only device event log.
//!
//! Every state-changing action records one typed [`DeviceEvent`]. Observers
//! (the scenario engine, the CLI) keep a cursor into the log instead of
//! reading a single overwritable slot, so two events produced in the same
//! tick are both seen, in order.

use super::state::{DisplayMode, PacerMode, RhythmType};
use serde::{Serialize, Serializer};
use std::fmt;

/// Event name prefixes that carry a value suffix.
const VALUE_PREFIXES: [&str; 9] = [
    "displayModeSetTo_",
    "manualEnergySetTo_",
    "pacerFrequencySetTo_",
    "pacerIntensitySetTo_",
    "pacerModeSetTo_",
    "isPacingSetTo_",
    "rhythmTypeSetTo_",
    "heartRateSetTo_",
    "synchroMode_",
];

/// Event names without a value suffix.
const PLAIN_NAMES: [&str; 8] = [
    "chargeStarted",
    "chargeCompleted",
    "shockDelivered",
    "chargeCanceled",
    "stateReset",
    "timeoutCompleted",
    "rhythmAnalyzed_shockable",
    "rhythmAnalyzed_nonShockable",
];

/// A significant device transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    DisplayModeSet(DisplayMode),
    ManualEnergySet(String),
    SynchroModeToggled { active: bool },
    ChargeStarted,
    ChargeCompleted,
    ShockDelivered { count: u32 },
    ChargeCanceled,
    PacerFrequencySet(u16),
    PacerIntensitySet(u16),
    PacerModeSet(PacerMode),
    PacingToggled { active: bool },
    RhythmSet(RhythmType),
    HeartRateSet(u16),
    RhythmAnalyzed { shockable: bool },
    /// Device returned to its initial state (ARRET or explicit reset)
    StateReset,
    /// Synthetic event written by the scenario engine when a step timeout
    /// elapses
    TimeoutCompleted { elapsed_ms: u64 },
}

impl DeviceEvent {
    /// Stable event name, as matched by scenario `event` conditions.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::DisplayModeSet(mode) => format!("displayModeSetTo_{mode}"),
            Self::ManualEnergySet(label) => format!("manualEnergySetTo_{label}"),
            Self::SynchroModeToggled { active: true } => "synchroMode_activated".to_string(),
            Self::SynchroModeToggled { active: false } => "synchroMode_deactivated".to_string(),
            Self::ChargeStarted => "chargeStarted".to_string(),
            Self::ChargeCompleted => "chargeCompleted".to_string(),
            Self::ShockDelivered { .. } => "shockDelivered".to_string(),
            Self::ChargeCanceled => "chargeCanceled".to_string(),
            Self::PacerFrequencySet(hz) => format!("pacerFrequencySetTo_{hz}"),
            Self::PacerIntensitySet(ma) => format!("pacerIntensitySetTo_{ma}"),
            Self::PacerModeSet(mode) => format!("pacerModeSetTo_{mode}"),
            Self::PacingToggled { active } => format!("isPacingSetTo_{active}"),
            Self::RhythmSet(rhythm) => format!("rhythmTypeSetTo_{rhythm}"),
            Self::HeartRateSet(bpm) => format!("heartRateSetTo_{bpm}"),
            Self::RhythmAnalyzed { shockable: true } => "rhythmAnalyzed_shockable".to_string(),
            Self::RhythmAnalyzed { shockable: false } => {
                "rhythmAnalyzed_nonShockable".to_string()
            }
            Self::StateReset => "stateReset".to_string(),
            Self::TimeoutCompleted { .. } => "timeoutCompleted".to_string(),
        }
    }

    /// Whether some event could carry this name.
    #[must_use]
    pub fn is_known_name(name: &str) -> bool {
        PLAIN_NAMES.contains(&name)
            || VALUE_PREFIXES
                .iter()
                .any(|prefix| name.len() > prefix.len() && name.starts_with(prefix))
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl Serialize for DeviceEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One entry of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Position in the log, starting at 0
    pub seq: u64,
    /// Virtual time of the transition
    pub at_ms: u64,
    pub event: DeviceEvent,
}

/// Append-only log of device events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event; returns its sequence number.
    pub fn record(&mut self, at_ms: u64, event: DeviceEvent) -> u64 {
        let seq = self.next_seq();
        self.records.push(EventRecord { seq, at_ms, event });
        seq
    }

    /// Sequence number the next event will get
    #[must_use]
    pub fn next_seq(&self) -> u64 {
        self.records.last().map_or(0, |r| r.seq + 1)
    }

    /// Most recent record
    #[must_use]
    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    /// Records with `seq >= cursor`, oldest first.
    #[must_use]
    pub fn since(&self, cursor: u64) -> &[EventRecord] {
        let start = self.records.partition_point(|r| r.seq < cursor);
        &self.records[start..]
    }

    /// Every record, oldest first
    #[must_use]
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count of records with the given name
    #[must_use]
    pub fn count_named(&self, name: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.event.name() == name)
            .count()
    }
}
