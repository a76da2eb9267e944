use std::fs;

use anyhow::{Context, Result};
use fusebox_content::Content;
use fusebox_engine::cli::{self, Command, RunArgs};
use fusebox_engine::{run_scenario, RuntimeConfig, Scenario};

fn main() -> Result<()> {
    env_logger::init();
    match cli::parse()? {
        Command::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let content = Content::from_json_file(&args.content).context("loading content bundle")?;
    let scenario = Scenario::from_json_file(&args.scenario).context("loading scenario")?;
    let config =
        RuntimeConfig::from_json_file(args.config.as_deref()).context("loading runtime config")?;
    let seconds = args.seconds_or(scenario.seconds);

    let report = run_scenario(&content, &scenario, &config, seconds)?;

    if args.verbose {
        for entry in report.events.entries() {
            println!("[{:>6}] {}", entry.tick, entry.label);
        }
    }
    println!(
        "Simulated {:.2}s: {} events, {} world commands, mission {}",
        report.elapsed,
        report.events.len(),
        report.world_commands.len(),
        if report.mission_complete {
            "complete"
        } else {
            "in progress"
        }
    );
    if let Some(task) = report.last_task.as_ref() {
        println!("Last task started: {task}");
    }

    if let Some(path) = args.event_log_json.as_ref() {
        let json = serde_json::to_string_pretty(&report.events)
            .context("serializing event log to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing event log to {}", path.display()))?;
        println!("Saved event log to {}", path.display());
    }
    Ok(())
}
