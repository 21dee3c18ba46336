//! Console command handler: drive the device by hand.
//!
//! Commands are read line by line from stdin. A tokio interval moves virtual
//! time forward at `--speed` times wall-clock rate; `--speed 0` freezes the
//! clock so only `wait` advances it, which makes sessions reproducible when
//! stdin is a file.

use super::resolve_scenario;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{format_clock, Reporter};
use crate::ConsoleArgs;
use defib_sim::waveform::displayed_rhythm;
use defib_sim::{Defibrillator, DeviceAction, ScenarioEngine};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

const HELP: &str = "\
commands:
  mode <DAE|ARRET|Moniteur|Stimulateur|Manuel>   rotate the selector
  energy <joules>        select manual energy
  sync                   toggle synchronized mode
  charge | shock | cancel
  pace                   start/stop pacing
  freq <ppm>             pacer frequency
  intensity <mA>         pacer intensity
  pacer <Fixe|Sentinelle>
  rhythm <name>          patient rhythm (sinus, fibrillationVentriculaire, ...)
  hr <bpm>               patient heart rate
  analyze                DAE rhythm analysis
  reset                  reset the device
  wait <ms>              advance virtual time
  start <scenario>       start a scenario (built-in id or file)
  stop                   stop the running scenario
  status | help | quit
  {\"action\": ...}        any action as JSON";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Act(DeviceAction),
    Wait(u64),
    Start(String),
    Stop,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> CliResult<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if line.starts_with('{') {
        let action: DeviceAction = serde_json::from_str(line)
            .map_err(|e| CliError::invalid_argument(format!("bad action JSON: {e}")))?;
        return Ok(Some(ConsoleCommand::Act(action)));
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let arg = words.next();

    let command = match verb.as_str() {
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        "help" | "?" => ConsoleCommand::Help,
        "status" | "s" => ConsoleCommand::Status,
        "stop" => ConsoleCommand::Stop,
        "start" => ConsoleCommand::Start(required(&verb, arg)?.to_string()),
        "wait" => ConsoleCommand::Wait(number(&verb, arg)?),
        "sync" | "synchro" => ConsoleCommand::Act(DeviceAction::ToggleSynchroMode),
        "charge" => ConsoleCommand::Act(DeviceAction::StartCharging),
        "shock" => ConsoleCommand::Act(DeviceAction::DeliverShock),
        "cancel" => ConsoleCommand::Act(DeviceAction::CancelCharge),
        "pace" => ConsoleCommand::Act(DeviceAction::ToggleIsPacing),
        "analyze" => ConsoleCommand::Act(DeviceAction::AnalyzeRhythm),
        "reset" => ConsoleCommand::Act(DeviceAction::ResetState),
        "mode" => ConsoleCommand::Act(DeviceAction::SetDisplayMode {
            mode: label(&verb, arg)?,
        }),
        "energy" => ConsoleCommand::Act(DeviceAction::SetManualEnergy {
            energy: required(&verb, arg)?.to_string(),
        }),
        "freq" | "frequency" => ConsoleCommand::Act(DeviceAction::SetPacerFrequency {
            frequency: number(&verb, arg)?,
        }),
        "intensity" => ConsoleCommand::Act(DeviceAction::SetPacerIntensity {
            intensity: number(&verb, arg)?,
        }),
        "pacer" => ConsoleCommand::Act(DeviceAction::SetPacerMode {
            mode: label(&verb, arg)?,
        }),
        "rhythm" => ConsoleCommand::Act(DeviceAction::SetRhythm {
            rhythm: label(&verb, arg)?,
        }),
        "hr" => ConsoleCommand::Act(DeviceAction::SetHeartRate {
            bpm: number(&verb, arg)?,
        }),
        _ => {
            return Err(CliError::invalid_argument(format!(
                "unknown command '{verb}' (try 'help')"
            )))
        }
    };
    Ok(Some(command))
}

fn required<'a>(verb: &str, arg: Option<&'a str>) -> CliResult<&'a str> {
    arg.ok_or_else(|| CliError::invalid_argument(format!("'{verb}' needs an argument")))
}

fn number<T: std::str::FromStr>(verb: &str, arg: Option<&str>) -> CliResult<T> {
    let raw = required(verb, arg)?;
    raw.parse()
        .map_err(|_| CliError::invalid_argument(format!("'{verb}' expects a number, got '{raw}'")))
}

fn label<T>(verb: &str, arg: Option<&str>) -> CliResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    required(verb, arg)?
        .parse()
        .map_err(|e: T::Err| CliError::invalid_argument(e.to_string()))
}

/// Interactive session state: the engine plus what has been shown so far.
#[derive(Debug)]
pub struct ConsoleSession {
    engine: ScenarioEngine,
    speed: f64,
    /// Fractional virtual milliseconds not yet applied
    carry: f64,
    cursor: u64,
    shown_steps: usize,
    outcome_shown: bool,
}

impl ConsoleSession {
    #[must_use]
    pub fn new(device: Defibrillator, speed: f64) -> Self {
        let cursor = device.events().next_seq();
        Self {
            engine: ScenarioEngine::new(device),
            speed,
            carry: 0.0,
            cursor,
            shown_steps: 0,
            outcome_shown: false,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &ScenarioEngine {
        &self.engine
    }

    /// Apply `wall_ms` of wall-clock time at the session speed.
    pub fn tick(&mut self, wall_ms: u64) -> Vec<String> {
        if self.speed <= 0.0 {
            return Vec::new();
        }
        let total = wall_ms as f64 * self.speed + self.carry;
        let whole = total.floor();
        self.carry = total - whole;
        self.engine.advance(whole as u64);
        self.drain()
    }

    /// Run one command. `Quit` is handled by the caller.
    pub fn execute(&mut self, command: ConsoleCommand) -> CliResult<Vec<String>> {
        let mut out = Vec::new();
        match command {
            ConsoleCommand::Act(action) => {
                let accepted = self.engine.dispatch(&action);
                if !accepted {
                    out.push(format!("({} ignored)", action.label()));
                }
            }
            ConsoleCommand::Wait(ms) => self.engine.advance(ms),
            ConsoleCommand::Start(source) => {
                let resolved = resolve_scenario(&source)?;
                let title = resolved.config.title.clone();
                self.engine.start_scenario(resolved.config)?;
                self.cursor = self.engine.device().events().next_seq();
                self.shown_steps = 0;
                self.outcome_shown = false;
                info!(scenario = %source, "console scenario started");
                out.push(format!("scenario started: {title}"));
                out.extend(self.current_step_line());
            }
            ConsoleCommand::Stop => {
                self.engine.stop_scenario();
                self.outcome_shown = true;
                out.push("scenario stopped".to_string());
            }
            ConsoleCommand::Status => out.extend(self.status()),
            ConsoleCommand::Help => out.push(HELP.to_string()),
            ConsoleCommand::Quit => {}
        }
        out.extend(self.drain());
        Ok(out)
    }

    /// Lines for events and scenario progress not shown yet.
    pub fn drain(&mut self) -> Vec<String> {
        let mut out: Vec<String> = self
            .engine
            .device()
            .events()
            .since(self.cursor)
            .iter()
            .map(|record| format!("[{}] {}", format_clock(record.at_ms), record.event))
            .collect();
        self.cursor = self.engine.device().events().next_seq();

        let completed = self.engine.runtime().completed.len();
        if completed > self.shown_steps {
            for record in &self.engine.runtime().completed[self.shown_steps..] {
                out.push(format!("step {} complete", record.step));
            }
            self.shown_steps = completed;
            out.extend(self.current_step_line());
        }

        if !self.outcome_shown {
            if self.engine.is_complete() {
                out.push("scenario completed".to_string());
                self.outcome_shown = true;
            } else if let Some(message) = self.engine.failure_message() {
                out.push(format!("scenario failed: {message}"));
                self.outcome_shown = true;
            }
        }
        out
    }

    fn current_step_line(&self) -> Option<String> {
        if !self.engine.is_active() {
            return None;
        }
        self.engine.current_step().map(|step| {
            format!(
                "step {}: {}",
                self.engine.runtime().current_step_index,
                step.description
            )
        })
    }

    /// Front-panel summary
    #[must_use]
    pub fn status(&self) -> Vec<String> {
        let device = self.engine.device();
        let state = device.state();
        let (rhythm, rate) = displayed_rhythm(state, device.timing().pacing_capture_threshold);
        let mut lines = vec![
            format!(
                "{} mode {}  energy {} J{}",
                format_clock(device.now_ms()),
                state.display_mode,
                state.manual_energy,
                if state.is_synchro_mode { "  SYNC" } else { "" }
            ),
            format!("rhythm {rhythm} @ {rate} bpm"),
            format!(
                "charge {}%{}  shocks {}",
                state.charge_progress,
                if state.is_charged { " READY" } else { "" },
                state.shock_count
            ),
            format!(
                "pacer {} {} ppm {} mA{}",
                state.pacer_mode,
                state.pacer_frequency,
                state.pacer_intensity,
                if state.is_pacing { " ON" } else { "" }
            ),
        ];
        if let Some(config) = self.engine.config() {
            let runtime = self.engine.runtime();
            lines.push(format!(
                "scenario {} step {}/{}{}",
                config.id,
                runtime.current_step_index,
                config.steps.len(),
                if runtime.is_active { "" } else { " (inactive)" }
            ));
        }
        lines
    }
}

/// Execute the console command
pub fn execute_console(config: &CliConfig, args: &ConsoleArgs) -> CliResult<()> {
    if args.tick_ms == 0 {
        return Err(CliError::invalid_argument("--tick-ms must be positive"));
    }
    if !args.speed.is_finite() || args.speed < 0.0 {
        return Err(CliError::invalid_argument("--speed must be zero or positive"));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_console(config, args))
}

async fn run_console(config: &CliConfig, args: &ConsoleArgs) -> CliResult<()> {
    let reporter = Reporter::from_config(config);
    let mut session = ConsoleSession::new(Defibrillator::new(config.sim.device), args.speed);
    if let Some(source) = &args.scenario {
        print_lines(&reporter, &session.execute(ConsoleCommand::Start(source.clone()))?);
    }

    let period = Duration::from_millis(args.tick_ms);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let clock_running = args.speed > 0.0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = ticker.tick(), if clock_running => {
                print_lines(&reporter, &session.tick(args.tick_ms));
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("console input closed");
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => match session.execute(command) {
                        Ok(out) => print_lines(&reporter, &out),
                        Err(err) => reporter.failure(&err.to_string()),
                    },
                    Ok(None) => {}
                    Err(err) => reporter.failure(&err.to_string()),
                }
            }
        }
    }

    print_lines(&reporter, &session.status());
    Ok(())
}

fn print_lines(reporter: &Reporter, lines: &[String]) {
    for line in lines {
        reporter.line(line);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use defib_sim::{DisplayMode, RhythmType};

    fn session() -> ConsoleSession {
        ConsoleSession::new(Defibrillator::default(), 1.0)
    }

    fn run(session: &mut ConsoleSession, line: &str) -> Vec<String> {
        let command = parse_command(line).unwrap().unwrap();
        session.execute(command).unwrap()
    }

    #[test]
    fn test_parse_words() {
        assert_eq!(
            parse_command("mode manuel").unwrap(),
            Some(ConsoleCommand::Act(DeviceAction::SetDisplayMode {
                mode: DisplayMode::Manuel
            }))
        );
        assert_eq!(
            parse_command("  RHYTHM bav3 ").unwrap(),
            Some(ConsoleCommand::Act(DeviceAction::SetRhythm {
                rhythm: RhythmType::Bav3
            }))
        );
        assert_eq!(parse_command("wait 250").unwrap(), Some(ConsoleCommand::Wait(250)));
        assert_eq!(parse_command("q").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("# note").unwrap(), None);
        assert_eq!(parse_command("").unwrap(), None);
    }

    #[test]
    fn test_parse_json_action() {
        assert_eq!(
            parse_command(r#"{"action":"setHeartRate","bpm":110}"#).unwrap(),
            Some(ConsoleCommand::Act(DeviceAction::SetHeartRate { bpm: 110 }))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("teleport").is_err());
        assert!(parse_command("wait").is_err());
        assert!(parse_command("freq fast").is_err());
        assert!(parse_command("mode turbo").is_err());
    }

    #[test]
    fn test_events_are_shown_once() {
        let mut s = session();
        let out = run(&mut s, "mode manuel");
        assert_eq!(out, vec!["[00:00.000] displayModeSetTo_Manuel"]);
        assert!(s.drain().is_empty());
    }

    #[test]
    fn test_rejected_action_is_reported() {
        let mut s = session();
        let out = run(&mut s, "shock");
        assert_eq!(out, vec!["(shock ignored)"]);
    }

    #[test]
    fn test_tick_scales_and_carries_fractions() {
        let mut s = ConsoleSession::new(Defibrillator::default(), 0.5);
        s.tick(1);
        assert_eq!(s.engine().now_ms(), 0);
        s.tick(1);
        assert_eq!(s.engine().now_ms(), 1);
        s.tick(100);
        assert_eq!(s.engine().now_ms(), 51);
    }

    #[test]
    fn test_paused_clock_ignores_ticks() {
        let mut s = ConsoleSession::new(Defibrillator::default(), 0.0);
        assert!(s.tick(10_000).is_empty());
        assert_eq!(s.engine().now_ms(), 0);
    }

    #[test]
    fn test_scenario_progress_lines() {
        let mut s = ConsoleSession::new(Defibrillator::default(), 0.0);
        let out = run(&mut s, "start dae-vf");
        assert!(out[0].starts_with("scenario started"));
        assert!(out.iter().any(|l| l.starts_with("step 0:")));

        let out = run(&mut s, "mode dae");
        assert!(out.contains(&"step 0 complete".to_string()));
        run(&mut s, "analyze");
        let status = s.status();
        assert!(status.last().unwrap().starts_with("scenario dae-vf step 2/"));
    }

    #[test]
    fn test_reference_session_by_hand() {
        let mut s = ConsoleSession::new(Defibrillator::default(), 0.0);
        run(&mut s, "start vf-manual-shock");
        let mut out = Vec::new();
        for line in [
            "mode manuel",
            "energy 200",
            "charge",
            "wait 5000",
            "shock",
            "wait 4000",
        ] {
            out.extend(run(&mut s, line));
        }
        assert!(out.contains(&"scenario completed".to_string()));
        assert!(s.engine().is_complete());
    }

    #[test]
    fn test_stop_hides_later_outcome() {
        let mut s = ConsoleSession::new(Defibrillator::default(), 0.0);
        run(&mut s, "start bav3-pacing");
        let out = run(&mut s, "stop");
        assert_eq!(out, vec!["scenario stopped"]);
        assert!(!s.engine().is_active());
    }

    #[test]
    fn test_status_shows_paced_rhythm() {
        let mut s = session();
        for line in ["mode stimulateur", "freq 90", "intensity 80", "pace"] {
            run(&mut s, line);
        }
        let status = s.status();
        assert_eq!(status[1], "rhythm electroEntrainement @ 90 bpm");
        assert!(status[3].ends_with(" ON"));
    }
}
