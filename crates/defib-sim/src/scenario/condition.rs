//! Recursive evaluation of validation trees and constraints.

use super::schema::{Condition, Constraint, Validation};
use crate::device::{DeviceEvent, DeviceState};
use serde_json::{Map, Value};
use tracing::debug;

/// What a condition is evaluated against: a snapshot of the device state
/// and, optionally, the single event being observed.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    properties: Map<String, Value>,
    event: Option<&'a DeviceEvent>,
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub fn new(state: &DeviceState, event: Option<&'a DeviceEvent>) -> Self {
        let properties = match state.to_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { properties, event }
    }

    /// Property value by document name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    #[must_use]
    pub fn event(&self) -> Option<&'a DeviceEvent> {
        self.event
    }
}

/// Compare a device property against a document value.
///
/// Numbers compare by value regardless of integer/float representation, and
/// string properties (energy labels) also match a bare number, so
/// `value: 200` matches `manualEnergy: "200"`.
#[must_use]
pub fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Value::String(a), Value::Number(b)) => *a == b.to_string(),
        _ => actual == expected,
    }
}

impl Condition {
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Self::StateChange { property, value } => match ctx.property(property) {
                Some(actual) => values_match(actual, value),
                None => {
                    debug!(property = %property, "condition on unknown property never holds");
                    false
                }
            },
            Self::Event { event } => ctx.event().is_some_and(|e| e.name() == *event),
            Self::Timeout { duration } => matches!(
                ctx.event(),
                Some(DeviceEvent::TimeoutCompleted { elapsed_ms }) if elapsed_ms >= duration
            ),
        }
    }
}

impl Validation {
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Self::AllOf { all_of } => all_of.iter().all(|child| child.evaluate(ctx)),
            Self::AnyOf { any_of } => any_of.iter().any(|child| child.evaluate(ctx)),
            Self::Single(condition) => condition.evaluate(ctx),
        }
    }
}

impl Constraint {
    /// Whether the device currently breaks this constraint.
    ///
    /// A constraint on an unknown property can't be checked and is never
    /// reported as broken.
    pub fn is_violated(&self, ctx: &EvalContext<'_>) -> bool {
        let Some(actual) = ctx.property(&self.property) else {
            debug!(property = %self.property, "constraint on unknown property skipped");
            return false;
        };
        let wrong = self
            .must_be
            .as_ref()
            .is_some_and(|expected| !values_match(actual, expected));
        let forbidden = self
            .must_not_be
            .as_ref()
            .is_some_and(|forbidden| values_match(actual, forbidden));
        wrong || forbidden
    }
}
