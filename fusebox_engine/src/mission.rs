use std::collections::BTreeSet;
use std::rc::Rc;

use fusebox_content::{ClipStore, ConfigurationError, MissionDef};

use crate::config::{MissionTuning, RuntimeConfig};
use crate::level_script::{LevelScript, ScheduledCommand, WorldCommand};
use crate::orchestrator::{ActorEvent, Orchestrator, Progress, WorldEvent};
use crate::services::TickContext;
use crate::tasks::TaskOutcome;

/// Runs the mission's characters one after another, with a pause before each
/// one, and carries out the level script's world commands.
#[derive(Debug)]
pub struct MissionDriver {
    mission: MissionDef,
    tuning: MissionTuning,
    orchestrator: Orchestrator,
    script: Rc<LevelScript>,
    index: usize,
    start_timer: Option<f32>,
    finished: BTreeSet<usize>,
    delayed: Vec<ScheduledCommand>,
    complete: bool,
}

impl MissionDriver {
    pub fn new(
        mission: MissionDef,
        store: Rc<ClipStore>,
        config: &RuntimeConfig,
    ) -> Result<Self, ConfigurationError> {
        if mission.characters.is_empty() {
            return Err(ConfigurationError::EmptyMission);
        }
        let script = Rc::new(LevelScript::new());
        let mut orchestrator = Orchestrator::new(store, config)?;
        orchestrator.add_listener(script.clone());
        Ok(Self {
            mission,
            tuning: config.mission.clone(),
            orchestrator,
            script,
            index: 0,
            start_timer: None,
            finished: BTreeSet::new(),
            delayed: Vec::new(),
            complete: false,
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Index of the character currently on (or about to come on).
    pub fn character_index(&self) -> usize {
        self.index
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_waiting_to_start(&self) -> bool {
        self.start_timer.is_some()
    }

    /// Arms the first character after the start delay.
    pub fn start(&mut self, ctx: &mut TickContext<'_>) {
        ctx.log("mission.start");
        self.start_timer = Some(self.tuning.start_delay);
    }

    /// Rewinds to the first character and brings it on straight away.
    pub fn restart(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        ctx.log("mission.restart");
        self.orchestrator.stop_actor(ctx);
        self.index = 0;
        self.start_timer = None;
        self.finished.clear();
        self.delayed.clear();
        self.script.drain();
        self.complete = false;
        self.start_character(ctx)
    }

    pub fn world_event(
        &mut self,
        event: &WorldEvent,
        ctx: &mut TickContext<'_>,
    ) -> Result<TaskOutcome, ConfigurationError> {
        self.orchestrator.world_event(event, ctx)
    }

    pub fn actor_event(
        &mut self,
        event: &ActorEvent,
        ctx: &mut TickContext<'_>,
    ) -> Result<bool, ConfigurationError> {
        self.orchestrator.actor_event(event, ctx)
    }

    pub fn force_complete_list(&mut self, ctx: &mut TickContext<'_>) {
        self.orchestrator.force_complete_list(ctx);
    }

    pub fn fixed_tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        self.orchestrator.fixed_tick(ctx)
    }

    pub fn frame_tick(&mut self, dt: f32, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        if let Some(timer) = self.start_timer.as_mut() {
            *timer -= dt;
            if *timer <= 0.0 {
                self.start_timer = None;
                self.start_character(ctx)?;
            }
        }

        self.delayed.extend(self.script.drain());
        self.run_commands(dt, ctx)?;

        if self.orchestrator.frame_tick(dt, ctx)? == Progress::ActorFinished {
            self.finish_actor(ctx);
        }
        Ok(())
    }

    /// Stops the current character and schedules the next one. Repeated calls
    /// for the same character are ignored.
    pub fn finish_actor(&mut self, ctx: &mut TickContext<'_>) {
        let slot = self.orchestrator.slot();
        if !self.finished.insert(slot) {
            return;
        }
        self.orchestrator.stop_actor(ctx);
        if let Some(def) = self.mission.characters.get(slot) {
            ctx.log(format!("mission.actor.finish {}", def.name));
        }

        self.index = slot + 1;
        if self.index < self.mission.characters.len() {
            self.start_timer = Some(self.tuning.start_delay);
        } else {
            self.complete = true;
            ctx.log("mission.complete");
        }
    }

    fn start_character(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        let Some(def) = self.mission.characters.get(self.index).cloned() else {
            return Ok(());
        };
        log::info!("starting character {} ({})", self.index, def.name);
        ctx.log(format!("mission.actor.start {}", def.name));
        self.finished.remove(&self.index);
        self.orchestrator.start_character(&def, self.index, ctx)
    }

    fn run_commands(&mut self, dt: f32, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        let mut due = Vec::new();
        self.delayed.retain_mut(|scheduled| {
            scheduled.delay -= dt;
            if scheduled.delay <= 0.0 {
                due.push(scheduled.command.clone());
                false
            } else {
                true
            }
        });

        for command in due {
            ctx.log(format!("world.{command}"));
            match &command {
                WorldCommand::FinishActor => self.finish_actor(ctx),
                WorldCommand::TeleportActor { anchor } => {
                    self.orchestrator.teleport_actor(anchor, ctx)?;
                    ctx.stage.world_command(&command);
                }
                _ => ctx.stage.world_command(&command),
            }
        }
        Ok(())
    }
}
