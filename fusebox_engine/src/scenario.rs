//! Drives a mission headlessly from a timed list of world events.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{ensure, Context, Result};
use fusebox_content::Content;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::RuntimeConfig;
use crate::events::EventLog;
use crate::headless::{HeadlessStage, StageLayout};
use crate::mission::MissionDriver;
use crate::orchestrator::{ActorEvent, WorldEvent};
use crate::services::TickContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioAction {
    Grab {
        object: String,
    },
    Trigger {
        name: String,
    },
    Script {
        name: String,
    },
    Breach {
        #[serde(default = "default_breached")]
        breached: bool,
    },
    PlayClip {
        #[serde(default)]
        acting: Option<String>,
        #[serde(default)]
        audio: Option<String>,
    },
    Interrupt {
        interruptable: String,
        #[serde(default)]
        clip: usize,
    },
    ForceComplete,
    Restart,
    MovePlayer {
        position: Option<Vec3>,
    },
}

fn default_breached() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Seconds since the scenario started.
    pub at: f32,
    #[serde(flatten)]
    pub action: ScenarioAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub stage: StageLayout,
    #[serde(default)]
    pub events: Vec<ScenarioStep>,
    /// Default run length when the caller does not pick one.
    #[serde(default)]
    pub seconds: Option<f32>,
}

impl Scenario {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing scenario json")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse scenario: {}", path.display()))
    }
}

/// Result of one headless run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioReport {
    pub events: EventLog,
    pub world_commands: Vec<String>,
    pub chats: Vec<String>,
    pub mission_complete: bool,
    /// Most recently started task, if any list got under way.
    pub last_task: Option<String>,
    pub elapsed: f32,
}

/// Runs `content`'s mission against a headless stage for up to `seconds`.
///
/// Presentation ticks advance by `frame_delta`; before each one the fixed
/// simulation catches up in `fixed_delta` steps, so the two alternate when
/// both deltas match. Scenario events fire at the start of the first frame
/// whose time reaches them. The run stops early once the mission completes.
pub fn run_scenario(
    content: &Content,
    scenario: &Scenario,
    config: &RuntimeConfig,
    seconds: f32,
) -> Result<ScenarioReport> {
    config.validate()?;
    ensure!(seconds >= 0.0, "scenario length must not be negative (got {seconds})");

    let store = Rc::new(content.validate().context("validating content bundle")?);
    log::info!(
        "loaded {} acting clips and {} audio clips for {} characters",
        store.acting_len(),
        store.audio_len(),
        content.mission.characters.len()
    );
    let mut mission = MissionDriver::new(content.mission.clone(), store, config)
        .context("building mission driver")?;
    let mut stage = HeadlessStage::new(scenario.stage.clone());
    let mut events = EventLog::new();

    let mut pending: Vec<ScenarioStep> = scenario.events.clone();
    pending.sort_by(|a, b| a.at.total_cmp(&b.at));
    let mut pending: VecDeque<ScenarioStep> = pending.into();

    mission.start(&mut TickContext::new(&mut stage, &mut events));

    let mut clock = 0.0_f32;
    let mut fixed_clock = 0.0_f32;
    let mut tick: u64 = 0;
    while clock < seconds && !mission.is_complete() {
        clock += config.frame_delta;

        while pending.front().is_some_and(|step| step.at <= clock) {
            let Some(step) = pending.pop_front() else {
                break;
            };
            apply_step(&mut mission, &step, &mut stage, &mut events)
                .with_context(|| format!("applying scenario event at {}s", step.at))?;
        }

        while fixed_clock + config.fixed_delta <= clock {
            fixed_clock += config.fixed_delta;
            tick += 1;
            events.set_tick(tick);
            stage.advance(config.fixed_delta);
            let mut ctx = TickContext::new(&mut stage, &mut events);
            mission
                .fixed_tick(&mut ctx)
                .with_context(|| format!("fixed tick {tick}"))?;
        }

        let mut ctx = TickContext::new(&mut stage, &mut events);
        mission
            .frame_tick(config.frame_delta, &mut ctx)
            .with_context(|| format!("presentation tick at {clock:.3}s"))?;
    }

    log::info!(
        "scenario finished after {clock:.2}s with {} events (complete: {})",
        events.len(),
        mission.is_complete()
    );
    Ok(ScenarioReport {
        world_commands: stage.world_commands().to_vec(),
        chats: stage.chats().to_vec(),
        mission_complete: mission.is_complete(),
        last_task: mission
            .orchestrator()
            .tasks()
            .last_started()
            .map(|task| task.name.clone()),
        elapsed: clock,
        events,
    })
}

fn apply_step(
    mission: &mut MissionDriver,
    step: &ScenarioStep,
    stage: &mut HeadlessStage,
    events: &mut EventLog,
) -> Result<()> {
    log::debug!("scenario event {:?}", step.action);
    if let ScenarioAction::MovePlayer { position } = &step.action {
        stage.set_player_position(*position);
        return Ok(());
    }
    let ctx = &mut TickContext::new(stage, events);
    match &step.action {
        ScenarioAction::Grab { object } => {
            mission.world_event(&WorldEvent::ObjectGrabbed(object.clone()), ctx)?;
        }
        ScenarioAction::Trigger { name } => {
            mission.world_event(&WorldEvent::TriggerEntered(name.clone()), ctx)?;
        }
        ScenarioAction::Script { name } => {
            mission.world_event(&WorldEvent::ScriptSignal(name.clone()), ctx)?;
        }
        ScenarioAction::Breach { breached } => {
            mission.actor_event(&ActorEvent::PersonalSpace(*breached), ctx)?;
        }
        ScenarioAction::PlayClip { acting, audio } => {
            let event = ActorEvent::PlayClip {
                acting: acting.clone(),
                audio: audio.clone(),
            };
            mission.actor_event(&event, ctx)?;
        }
        ScenarioAction::Interrupt {
            interruptable,
            clip,
        } => {
            let event = ActorEvent::Interrupt {
                interruptable: interruptable.clone(),
                clip: *clip,
            };
            mission.actor_event(&event, ctx)?;
        }
        ScenarioAction::ForceComplete => mission.force_complete_list(ctx),
        ScenarioAction::Restart => mission.restart(ctx)?,
        ScenarioAction::MovePlayer { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = r#"{
        "audio_clips": [
            { "name": "hi_vo", "length": 0.2, "volume": [0.0] }
        ],
        "mission": {
            "characters": [
                {
                    "name": "sam",
                    "name_in_scene": "Sam",
                    "task_lists": [
                        {
                            "title": "Plug",
                            "start_chat": [ { "text": "grab it", "audio_clip": "hi_vo" } ],
                            "complete_chat": [ { "text": "nice", "duration": 0.1 } ],
                            "tasks": [ { "name": "Grab", "kind": "grab_object", "object": "plug" } ]
                        }
                    ]
                }
            ]
        }
    }"#;

    const SCENARIO: &str = r#"{
        "stage": { "scene_actors": ["Sam"] },
        "events": [
            { "at": 1.0, "kind": "grab", "object": "plug" },
            { "at": 0.5, "kind": "grab", "object": "sock" }
        ]
    }"#;

    fn config() -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.frame_delta = config.fixed_delta;
        config.mission.start_delay = 0.1;
        config
    }

    #[test]
    fn scenario_steps_parse_with_flattened_kind() {
        let scenario = Scenario::from_json_str(SCENARIO).expect("scenario");
        assert_eq!(scenario.events.len(), 2);
        assert_eq!(
            scenario.events[0].action,
            ScenarioAction::Grab {
                object: "plug".to_string()
            }
        );
        let breach: ScenarioStep =
            serde_json::from_str(r#"{ "at": 2.0, "kind": "breach" }"#).expect("breach");
        assert_eq!(breach.action, ScenarioAction::Breach { breached: true });
    }

    #[test]
    fn run_completes_single_character_mission() {
        let content = Content::from_json_str(CONTENT).expect("content");
        let scenario = Scenario::from_json_str(SCENARIO).expect("scenario");
        let report = run_scenario(&content, &scenario, &config(), 10.0).expect("run");

        assert!(report.mission_complete);
        assert!(report.elapsed < 10.0);
        assert_eq!(report.last_task.as_deref(), Some("Grab"));
        assert_eq!(report.chats, vec!["grab it".to_string(), "nice".to_string()]);
        let events = &report.events;
        let grab = events.position("task.complete Grab").expect("grab completes");
        let line = events.position("chat.line 0 grab it").expect("line shown");
        assert!(line < grab);
        assert!(events.contains("mission.complete"));
        assert!(events.entries().windows(2).all(|pair| pair[0].tick <= pair[1].tick));
    }

    #[test]
    fn short_run_stops_before_mission_ends() {
        let content = Content::from_json_str(CONTENT).expect("content");
        let scenario = Scenario::from_json_str(SCENARIO).expect("scenario");
        let report = run_scenario(&content, &scenario, &config(), 0.6).expect("run");
        assert!(!report.mission_complete);
        assert!(!report.events.contains("task.complete Grab"));
    }

    #[test]
    fn missing_scene_actor_is_reported() {
        let content = Content::from_json_str(CONTENT).expect("content");
        let scenario = Scenario::default();
        let err = run_scenario(&content, &scenario, &config(), 1.0).expect_err("no Sam");
        assert!(format!("{err:#}").contains("cannot find actor for character `Sam`"));
    }
}
