//! Runtime for the fusebox mission: acting-clip blending, mouth and sentence
//! tracking, the task/dialogue state machine, the orchestrator that binds one
//! actor to its task lists, and a headless stage for scripted runs.

pub mod actor;
pub mod blend;
pub mod cli;
pub mod config;
pub mod dialogue;
pub mod events;
pub mod face;
pub mod headless;
pub mod level_script;
pub mod mission;
pub mod orchestrator;
pub mod scenario;
pub mod services;
pub mod tasks;

pub use config::RuntimeConfig;
pub use events::{EventLog, EventLogEntry};
pub use mission::MissionDriver;
pub use scenario::{run_scenario, Scenario, ScenarioReport};
