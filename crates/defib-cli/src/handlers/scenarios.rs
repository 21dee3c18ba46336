//! Scenarios command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use crate::ScenariosArgs;
use defib_sim::scenario::{builtin, Condition, Validation};
use defib_sim::{ScenarioConfig, BUILTIN_SCENARIOS};
use serde::Serialize;

/// One line of the scenario listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub id: String,
    pub title: String,
    pub steps: usize,
    /// Virtual duration of the reference session
    pub reference_ms: u64,
}

/// Execute the scenarios command
pub fn execute_scenarios(config: &CliConfig, args: &ScenariosArgs) -> CliResult<()> {
    let reporter = Reporter::from_config(config);

    let Some(id) = &args.id else {
        let summaries = list()?;
        if config.is_json() {
            reporter.json(&summaries)?;
        } else {
            for summary in &summaries {
                reporter.line(&format!(
                    "{:<18} {:>2} steps  {}",
                    summary.id, summary.steps, summary.title
                ));
            }
        }
        return Ok(());
    };

    let found = builtin(id)
        .ok_or_else(|| CliError::invalid_argument(format!("no built-in scenario '{id}'")))?;
    if args.yaml {
        print!("{}", found.document);
        return Ok(());
    }
    let scenario = found.config()?;
    if config.is_json() {
        reporter.json(&scenario)?;
    } else {
        describe(&reporter, &scenario);
    }
    Ok(())
}

/// Summaries of every bundled scenario
pub fn list() -> CliResult<Vec<ScenarioSummary>> {
    BUILTIN_SCENARIOS
        .iter()
        .map(|found| {
            let scenario = found.config()?;
            Ok(ScenarioSummary {
                id: scenario.id,
                title: scenario.title,
                steps: scenario.steps.len(),
                reference_ms: found.script()?.duration_ms(),
            })
        })
        .collect()
}

fn describe(reporter: &Reporter, scenario: &ScenarioConfig) {
    reporter.heading(&format!("{} - {}", scenario.id, scenario.title));
    if !scenario.description.is_empty() {
        reporter.detail(scenario.description.trim());
    }
    for (index, step) in scenario.steps.iter().enumerate() {
        reporter.line(&format!("{index:>2}. {}", step.description));
        reporter.detail(&format!("    until {}", describe_validation(&step.validation)));
        for constraint in &step.constraints {
            reporter.detail(&format!(
                "    keep {} ({})",
                constraint.property,
                constraint.failure_message()
            ));
        }
    }
}

/// One-line rendering of a validation tree
#[must_use]
pub fn describe_validation(validation: &Validation) -> String {
    match validation {
        Validation::Single(condition) => describe_condition(condition),
        Validation::AllOf { all_of } => join(all_of, " and "),
        Validation::AnyOf { any_of } => join(any_of, " or "),
    }
}

fn join(children: &[Validation], separator: &str) -> String {
    children
        .iter()
        .map(|child| match child {
            Validation::Single(condition) => describe_condition(condition),
            group => format!("({})", describe_validation(group)),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn describe_condition(condition: &Condition) -> String {
    match condition {
        Condition::StateChange { property, value } => format!("{property} = {value}"),
        Condition::Event { event } => format!("event {event}"),
        Condition::Timeout { duration } => format!("{duration} ms elapsed"),
    }
}
