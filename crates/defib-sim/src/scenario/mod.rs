//! Declarative training scenarios.
//!
//! - [`schema`]: the document format and its structural checks
//! - [`condition`]: evaluation of validation trees and constraints
//! - [`engine`]: the [`ScenarioEngine`] that plays a document against a device
//! - [`script`]: replayable trainee sessions
//! - [`library`]: scenarios bundled with the crate

pub mod condition;
pub mod engine;
pub mod library;
pub mod schema;
pub mod script;

pub use condition::{values_match, EvalContext};
pub use engine::{ScenarioEngine, ScenarioRuntime, StepRecord};
pub use library::{builtin, BuiltinScenario, BUILTIN_SCENARIOS};
pub use schema::{
    CompletionAction, Condition, Constraint, ScenarioConfig, ScenarioDiagnostic, ScenarioError,
    ScenarioStep, Validation,
};
pub use script::{ActionScript, PlaybackSummary, ScriptStep};
