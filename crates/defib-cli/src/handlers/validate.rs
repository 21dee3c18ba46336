//! Validate command handler

use super::resolve_scenario;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::Reporter;
use crate::ValidateArgs;
use serde::Serialize;

/// Outcome of checking one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Argument as given
    pub source: String,
    /// Scenario id when the document parsed
    pub id: Option<String>,
    pub steps: usize,
    /// Parse or structural error
    pub error: Option<String>,
    /// Lint findings (unknown names, misnumbered steps)
    pub diagnostics: Vec<String>,
}

impl ValidationReport {
    /// Whether the document passes at the requested strictness
    #[must_use]
    pub fn passed(&self, strict: bool) -> bool {
        self.error.is_none() && (!strict || self.diagnostics.is_empty())
    }
}

/// Load one scenario and collect its findings.
#[must_use]
pub fn validate_document(source: &str) -> ValidationReport {
    match resolve_scenario(source) {
        Ok(resolved) => ValidationReport {
            source: source.to_string(),
            id: Some(resolved.config.id.clone()),
            steps: resolved.config.steps.len(),
            error: None,
            diagnostics: resolved
                .config
                .lint()
                .iter()
                .map(ToString::to_string)
                .collect(),
        },
        Err(err) => ValidationReport {
            source: source.to_string(),
            id: None,
            steps: 0,
            error: Some(err.to_string()),
            diagnostics: Vec::new(),
        },
    }
}

/// Execute the validate command
pub fn execute_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let reporter = Reporter::from_config(config);
    let reports: Vec<ValidationReport> = args
        .scenarios
        .iter()
        .map(|source| validate_document(source))
        .collect();

    if config.is_json() {
        reporter.json(&reports)?;
    } else {
        for report in &reports {
            print_report(&reporter, report, args.strict);
        }
    }

    let failed = reports.iter().filter(|r| !r.passed(args.strict)).count();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::validation(format!(
            "{failed} of {} document(s) rejected",
            reports.len()
        )))
    }
}

fn print_report(reporter: &Reporter, report: &ValidationReport, strict: bool) {
    match (&report.error, &report.id) {
        (Some(error), _) => reporter.failure(&format!("{}: {error}", report.source)),
        (None, Some(id)) if report.passed(strict) => reporter.success(&format!(
            "{} ({id}, {} steps)",
            report.source, report.steps
        )),
        (None, _) => reporter.failure(&format!("{}: lint findings", report.source)),
    }
    for diagnostic in &report.diagnostics {
        reporter.warning(&format!("  {diagnostic}"));
    }
}
