//! Run command handler: replay a session against a scenario

use super::resolve_scenario;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{format_clock, Reporter};
use crate::RunArgs;
use defib_sim::scenario::{PlaybackSummary, StepRecord};
use defib_sim::{ActionScript, DeviceState, EventRecord, ScenarioConfig, ScenarioEngine};
use serde::Serialize;
use tracing::warn;

/// Everything a replay produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub scenario: String,
    pub title: String,
    pub total_steps: usize,
    pub completed: bool,
    pub failure_message: Option<String>,
    pub steps: Vec<StepRecord>,
    pub playback: PlaybackSummary,
    pub final_state: DeviceState,
    /// Device event log, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<EventRecord>>,
}

/// Play `script` against `scenario` on a fresh device.
pub fn play_session(
    config: &CliConfig,
    scenario: ScenarioConfig,
    script: &ActionScript,
    trace: bool,
) -> CliResult<RunReport> {
    if let Some(target) = &script.scenario {
        if *target != scenario.id {
            warn!(script = %target, scenario = %scenario.id, "script was recorded for another scenario");
        }
    }

    let id = scenario.id.clone();
    let title = scenario.title.clone();
    let total_steps = scenario.steps.len();

    let mut engine = ScenarioEngine::with_timing(config.sim.device);
    engine.start_scenario(scenario)?;
    let playback = script.play(&mut engine);

    Ok(RunReport {
        scenario: id,
        title,
        total_steps,
        completed: engine.is_complete(),
        failure_message: engine.failure_message().map(str::to_string),
        steps: engine.runtime().completed.clone(),
        playback,
        final_state: engine.device().state().clone(),
        events: trace.then(|| engine.device().events().records().to_vec()),
    })
}

/// Execute the run command
pub fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let resolved = resolve_scenario(&args.scenario)?;
    let script = match (&args.script, resolved.builtin) {
        (Some(path), _) => ActionScript::load(path)?,
        (None, Some(builtin)) => builtin.script()?,
        (None, None) => {
            return Err(CliError::invalid_argument(format!(
                "'{}' has no reference session; pass --script",
                args.scenario
            )))
        }
    };

    let descriptions: Vec<String> = resolved
        .config
        .steps
        .iter()
        .map(|step| step.description.clone())
        .collect();
    let report = play_session(config, resolved.config, &script, args.trace)?;

    if config.is_json() {
        Reporter::from_config(config).json(&report)?;
    } else {
        print_report(&Reporter::from_config(config), &report, &descriptions);
    }

    if report.completed {
        Ok(())
    } else {
        Err(CliError::scenario_failed(report.failure_message.unwrap_or_else(|| {
            format!(
                "stopped after {} of {} steps",
                report.steps.len(),
                report.total_steps
            )
        })))
    }
}

fn print_report(reporter: &Reporter, report: &RunReport, descriptions: &[String]) {
    if report.title.is_empty() {
        reporter.heading(&report.scenario);
    } else {
        reporter.heading(&format!("{} - {}", report.scenario, report.title));
    }

    if let Some(events) = &report.events {
        for record in events {
            reporter.detail(&format!(
                "  {} #{:<3} {}",
                format_clock(record.at_ms),
                record.seq,
                record.event
            ));
        }
    }

    for record in &report.steps {
        let description = descriptions
            .get(record.step)
            .map_or("", String::as_str);
        reporter.success(&format!(
            "{} step {} {description}",
            format_clock(record.completed_at_ms),
            record.step
        ));
    }

    reporter.detail(&format!(
        "{} action(s), {} accepted, {} waited",
        report.playback.actions,
        report.playback.accepted,
        format_clock(report.playback.waited_ms)
    ));

    match (&report.failure_message, report.completed) {
        (_, true) => reporter.success("scenario completed"),
        (Some(message), false) => reporter.failure(message),
        (None, false) => reporter.failure(&format!(
            "stopped after {} of {} steps",
            report.steps.len(),
            report.total_steps
        )),
    }
}
