use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

const DEFAULT_SECONDS: f32 = 120.0;

#[derive(Parser, Debug)]
#[command(
    about = "Headless host that runs a fusebox mission against a scripted scenario",
    version
)]
pub struct Args {
    /// Content bundle JSON (clips plus the mission)
    #[arg(long)]
    pub content: PathBuf,

    /// Scenario JSON describing the stage and the timed player events
    #[arg(long)]
    pub scenario: PathBuf,

    /// Optional runtime tuning JSON; defaults apply to anything it omits
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seconds to simulate (defaults to the scenario's own length)
    #[arg(long)]
    pub seconds: Option<f32>,

    /// Path to write the event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Print every event label instead of the summary
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub enum Command {
    Run(RunArgs),
}

#[derive(Debug)]
pub struct RunArgs {
    pub content: PathBuf,
    pub scenario: PathBuf,
    pub config: Option<PathBuf>,
    pub seconds: Option<f32>,
    pub event_log_json: Option<PathBuf>,
    pub verbose: bool,
}

impl RunArgs {
    /// Explicit length, else the scenario's, else a generous default.
    pub fn seconds_or(&self, scenario_seconds: Option<f32>) -> f32 {
        self.seconds
            .or(scenario_seconds)
            .unwrap_or(DEFAULT_SECONDS)
    }
}

pub fn parse() -> Result<Command> {
    let args = Args::parse();
    args.into_command()
}

impl Args {
    fn into_command(self) -> Result<Command> {
        if let Some(seconds) = self.seconds {
            if !seconds.is_finite() || seconds < 0.0 {
                bail!("--seconds must be a non-negative number (got {seconds})");
            }
        }
        if self.content == self.scenario {
            bail!("--content and --scenario point at the same file");
        }

        Ok(Command::Run(RunArgs {
            content: self.content,
            scenario: self.scenario,
            config: self.config,
            seconds: self.seconds,
            event_log_json: self.event_log_json,
            verbose: self.verbose,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Result<Command> {
        let mut argv = vec![
            "fusebox_engine",
            "--content",
            "content.json",
            "--scenario",
            "scenario.json",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)?.into_command()
    }

    #[test]
    fn seconds_fall_back_to_scenario_then_default() {
        let Command::Run(run) = args(&[]).expect("command");
        assert_eq!(run.seconds_or(Some(4.0)), 4.0);
        assert_eq!(run.seconds_or(None), DEFAULT_SECONDS);

        let Command::Run(run) = args(&["--seconds", "2.5"]).expect("command");
        assert_eq!(run.seconds_or(Some(4.0)), 2.5);
    }

    #[test]
    fn negative_seconds_are_rejected() {
        let err = args(&["--seconds=-1"]).expect_err("negative");
        assert!(err.to_string().contains("--seconds"));
    }
}
