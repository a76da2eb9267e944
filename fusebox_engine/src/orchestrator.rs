//! Binds one active actor to one active task list at a time.
//!
//! An actor walks in (or appears), works through its task lists, then walks
//! back out (or simply stops). World events are routed into the task tracker;
//! list completion swaps the dialogue over to the list's completion chat, and
//! the end of that chat moves on to the next list.

use std::rc::Rc;

use fusebox_content::{
    BoundClip, CharacterDef, ClipStore, ConfigurationError, EnterType, ExitType, TaskListDef,
};
use glam::{Quat, Vec3};

use crate::actor::Actor;
use crate::config::{ActorTuning, OrchestratorTuning, RuntimeConfig};
use crate::dialogue::{ChatPhase, DialogueDriver, DialogueStep};
use crate::services::{ActorSource, TickContext};
use crate::tasks::{TaskListener, TaskOutcome, TaskTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorPhase {
    Invalid,
    Walking,
    Interacting,
    Exiting,
}

/// Things the player does in the world that tasks listen for.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    ObjectGrabbed(String),
    TriggerEntered(String),
    ScriptSignal(String),
}

/// Requests aimed at the current actor rather than its tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum ActorEvent {
    /// Plays a clip straight away, e.g. a sneeze with one of several voices.
    PlayClip {
        acting: Option<String>,
        audio: Option<String>,
    },
    /// Plays clip `clip` of the named interruptable through the interruption
    /// guard.
    Interrupt { interruptable: String, clip: usize },
    PersonalSpace(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Running,
    /// The actor has nothing left to do; the mission should move on.
    ActorFinished,
}

#[derive(Debug)]
pub struct Orchestrator {
    store: Rc<ClipStore>,
    fixed_delta: f32,
    actor_tuning: ActorTuning,
    tuning: OrchestratorTuning,
    walking_clip: Option<BoundClip>,
    tasks: TaskTracker,
    dialogue: DialogueDriver,
    def: Option<CharacterDef>,
    actor: Option<Actor>,
    parked: Vec<Actor>,
    phase: ActorPhase,
    slot: usize,
    list_index: usize,
    exit_target: Option<Vec3>,
    forced: bool,
}

impl Orchestrator {
    pub fn new(store: Rc<ClipStore>, config: &RuntimeConfig) -> Result<Self, ConfigurationError> {
        let walking_clip = config
            .orchestrator
            .walking_clip
            .as_deref()
            .map(|name| store.bind(Some(name), None))
            .transpose()?;
        Ok(Self {
            store,
            fixed_delta: config.fixed_delta,
            actor_tuning: config.actor.clone(),
            tuning: config.orchestrator.clone(),
            walking_clip,
            tasks: TaskTracker::new(),
            dialogue: DialogueDriver::new(),
            def: None,
            actor: None,
            parked: Vec::new(),
            phase: ActorPhase::Invalid,
            slot: 0,
            list_index: 0,
            exit_target: None,
            forced: false,
        })
    }

    pub fn add_listener(&mut self, listener: Rc<dyn TaskListener>) {
        self.tasks.add_listener(listener);
    }

    pub fn phase(&self) -> ActorPhase {
        self.phase
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn list_index(&self) -> usize {
        self.list_index
    }

    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    pub fn dialogue(&self) -> &DialogueDriver {
        &self.dialogue
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn parked(&self) -> &[Actor] {
        &self.parked
    }

    pub fn current_list(&self) -> Option<&TaskListDef> {
        self.def
            .as_ref()
            .and_then(|def| def.task_lists.get(self.list_index))
    }

    /// Hands the stage over to `def`. Whatever actor was active is silenced
    /// and parked so a later character can reuse it.
    pub fn start_character(
        &mut self,
        def: &CharacterDef,
        slot: usize,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), ConfigurationError> {
        if def.task_lists.is_empty() {
            return Err(ConfigurationError::EmptyCharacter(def.name.clone()));
        }
        self.park_current(ctx);
        self.tasks.clear();
        self.dialogue.clear();
        self.def = Some(def.clone());
        self.slot = slot;
        self.list_index = 0;
        self.exit_target = None;
        self.phase = ActorPhase::Invalid;

        if def.use_existing_character {
            let index = self
                .parked
                .iter()
                .position(|actor| actor.model_name() == def.model.as_deref())
                .ok_or_else(|| ConfigurationError::MissingActor(def.name.clone()))?;
            let mut actor = self.parked.remove(index);
            actor.setup(def, &self.store)?;
            ctx.log(format!("actor.{}.reuse", def.name));
            self.actor = Some(actor);
            return self.start_interacting(ctx);
        }

        let Some(model) = def.model.as_deref() else {
            let scene_name = def.name_in_scene.as_deref().unwrap_or(&def.name);
            let instance = ctx
                .stage
                .instantiate(&def.name, ActorSource::Scene(scene_name))
                .ok_or_else(|| ConfigurationError::MissingActor(scene_name.to_string()))?;
            let actor = Actor::new(def, instance, &self.store, &self.actor_tuning, self.fixed_delta)?;
            ctx.log(format!("actor.{}.claim {}", def.name, scene_name));
            self.actor = Some(actor);
            return self.start_interacting(ctx);
        };

        let (anchor, spawn) = self.spawn_point(slot, ctx)?;
        let instance = ctx
            .stage
            .instantiate(&def.name, ActorSource::Model { model, anchor: &anchor })
            .ok_or_else(|| ConfigurationError::MissingActor(def.name.clone()))?;
        let mut actor = Actor::new(def, instance, &self.store, &self.actor_tuning, self.fixed_delta)?;
        actor.set_position(spawn);
        ctx.log(format!("actor.{}.spawn {}", def.name, anchor));

        if def.enter == EnterType::WalkToSpawnPoint {
            self.interact_point(ctx)?;
            ctx.log(format!("actor.{}.walk", def.name));
            if let Some(clip) = self.walking_clip.clone() {
                actor.play(clip, ctx)?;
            }
            self.actor = Some(actor);
            self.phase = ActorPhase::Walking;
            return Ok(());
        }
        self.actor = Some(actor);
        self.start_interacting(ctx)
    }

    pub fn world_event(
        &mut self,
        event: &WorldEvent,
        ctx: &mut TickContext<'_>,
    ) -> Result<TaskOutcome, ConfigurationError> {
        let outcome = match event {
            WorldEvent::ObjectGrabbed(object) => self.tasks.player_grabbed_object(object, ctx),
            WorldEvent::TriggerEntered(trigger) => self.tasks.player_entered_trigger(trigger, ctx),
            WorldEvent::ScriptSignal(name) => self.tasks.complete_from_script(name, ctx),
        };
        if outcome == TaskOutcome::ListCompleted {
            self.begin_complete_chat(ctx);
        }
        Ok(outcome)
    }

    /// Returns whether the request reached an actor and was accepted.
    pub fn actor_event(
        &mut self,
        event: &ActorEvent,
        ctx: &mut TickContext<'_>,
    ) -> Result<bool, ConfigurationError> {
        let Some(actor) = self.actor.as_mut() else {
            log::warn!("no active actor for {event:?}");
            return Ok(false);
        };
        match event {
            ActorEvent::PlayClip { acting, audio } => {
                let clip = self.store.bind(acting.as_deref(), audio.as_deref())?;
                actor.play(clip, ctx)?;
                Ok(true)
            }
            ActorEvent::Interrupt {
                interruptable,
                clip,
            } => {
                let missing = || ConfigurationError::MissingInterruptable {
                    character: actor.name().to_string(),
                    name: interruptable.clone(),
                    clip: *clip,
                };
                let chosen = actor
                    .def()
                    .interruptable_named(interruptable)
                    .and_then(|def| def.clips.get(*clip))
                    .ok_or_else(missing)?;
                let bound = self
                    .store
                    .bind(Some(&chosen.acting_clip), chosen.audio_clip.as_deref())?;
                actor.play_interruption(bound, ctx)
            }
            ActorEvent::PersonalSpace(breached) => {
                actor.set_personal_space_breached(*breached);
                Ok(true)
            }
        }
    }

    /// Debug skip: plays the current list's completion chat and moves on to
    /// the next list once it ends, whether or not the tasks are done.
    pub fn force_complete_list(&mut self, ctx: &mut TickContext<'_>) {
        if self.phase != ActorPhase::Interacting {
            return;
        }
        if let Some(list) = self.current_list() {
            ctx.log(format!("task_list.force_complete {}", list.title));
        }
        self.forced = true;
        self.begin_complete_chat(ctx);
    }

    /// Silences the current actor without changing its phase.
    pub fn stop_actor(&mut self, ctx: &mut TickContext<'_>) {
        if let Some(actor) = self.actor.as_mut() {
            actor.stop();
            ctx.log(format!("actor.{}.stop", actor.name()));
        }
    }

    pub fn teleport_actor(
        &mut self,
        anchor: &str,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), ConfigurationError> {
        let position = ctx
            .stage
            .anchor(anchor)
            .ok_or_else(|| ConfigurationError::MissingAnchor(anchor.to_string()))?;
        if let Some(actor) = self.actor.as_mut() {
            actor.set_position(position);
        }
        Ok(())
    }

    pub fn fixed_tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        match self.actor.as_mut() {
            Some(actor) => actor.fixed_tick(ctx),
            None => Ok(()),
        }
    }

    pub fn frame_tick(
        &mut self,
        dt: f32,
        ctx: &mut TickContext<'_>,
    ) -> Result<Progress, ConfigurationError> {
        match self.phase {
            ActorPhase::Walking => self.update_walking(dt, ctx)?,
            ActorPhase::Exiting => {
                if self.update_exiting(dt, ctx)? {
                    return Ok(Progress::ActorFinished);
                }
            }
            ActorPhase::Interacting | ActorPhase::Invalid => {}
        }

        let Some(actor) = self.actor.as_mut() else {
            return Ok(Progress::Running);
        };
        if actor.looks_at_player() && self.phase == ActorPhase::Interacting {
            if let Some(player) = ctx.stage.player_position() {
                actor.face_player(player);
            }
        }
        let quiet = actor.is_quiet();

        match self.dialogue.tick(dt, quiet, &self.store)? {
            Some(DialogueStep::Line { index, chat, clip }) => {
                ctx.log(format!("chat.line {} {}", index, chat.text));
                ctx.stage.show_chat(&chat.text);
                if let Some(object) = chat.grab_object.as_deref() {
                    ctx.stage.present_object(object);
                }
                if !clip.is_empty() {
                    actor.play(clip, ctx)?;
                }
                Ok(Progress::Running)
            }
            Some(DialogueStep::Finished(phase)) => self.chat_finished(phase, ctx),
            None => Ok(Progress::Running),
        }
    }

    fn chat_finished(
        &mut self,
        phase: ChatPhase,
        ctx: &mut TickContext<'_>,
    ) -> Result<Progress, ConfigurationError> {
        ctx.log(format!("chat.finished {}", phase.label()));
        let outcome = self.tasks.complete_wait_for_chat(ctx);
        if phase == ChatPhase::Start && outcome == TaskOutcome::ListCompleted {
            self.begin_complete_chat(ctx);
            return Ok(Progress::Running);
        }
        if self.tasks.is_closed() || (phase == ChatPhase::Complete && self.forced) {
            return self.advance_list(ctx);
        }
        Ok(Progress::Running)
    }

    fn begin_complete_chat(&mut self, ctx: &mut TickContext<'_>) {
        let chats = self
            .current_list()
            .map(|list| list.complete_chat.clone())
            .unwrap_or_default();
        if self.dialogue.complete(chats) {
            ctx.log("chat.complete_queued");
        }
    }

    fn start_interacting(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        self.list_index = 0;
        if let Some(actor) = self.actor.as_ref() {
            ctx.log(format!("actor.{}.interact", actor.name()));
        }
        self.start_list(ctx)
    }

    fn start_list(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        let Some(list) = self.current_list().cloned() else {
            return Ok(());
        };
        self.phase = ActorPhase::Interacting;
        self.forced = false;
        self.dialogue.start(ChatPhase::Start, list.start_chat.clone());
        self.tasks.start_list(&list, ctx)?;
        Ok(())
    }

    fn advance_list(&mut self, ctx: &mut TickContext<'_>) -> Result<Progress, ConfigurationError> {
        let Some(def) = self.def.clone() else {
            return Ok(Progress::Running);
        };
        self.list_index += 1;
        if self.list_index < def.task_lists.len() {
            self.start_list(ctx)?;
            return Ok(Progress::Running);
        }

        ctx.log(format!("actor.{}.lists_complete", def.name));
        self.dialogue.clear();
        match def.exit {
            ExitType::None => {
                self.phase = ActorPhase::Invalid;
                Ok(Progress::ActorFinished)
            }
            ExitType::BackToSpawnPoint => {
                let (_, spawn) = self.spawn_point(self.slot, ctx)?;
                self.exit_target = Some(spawn);
                self.phase = ActorPhase::Exiting;
                ctx.log(format!("actor.{}.exit", def.name));
                Ok(Progress::Running)
            }
        }
    }

    fn update_walking(&mut self, dt: f32, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        let target = self.interact_point(ctx)?;
        let step = self.tuning.walk_speed * dt;
        let epsilon = self.tuning.arrive_epsilon;
        let Some(actor) = self.actor.as_mut() else {
            return Ok(());
        };
        if !step_towards(actor, target, step, epsilon) {
            return Ok(());
        }
        ctx.log(format!("actor.{}.arrive", actor.name()));
        self.start_interacting(ctx)
    }

    fn update_exiting(&mut self, dt: f32, ctx: &mut TickContext<'_>) -> Result<bool, ConfigurationError> {
        let Some(target) = self.exit_target else {
            return Ok(false);
        };
        let step = self.tuning.walk_speed * dt;
        let max_turn = self.tuning.rot_speed * dt;
        let epsilon = self.tuning.arrive_epsilon;
        let Some(actor) = self.actor.as_mut() else {
            return Ok(false);
        };
        if actor.def().rotate_on_exit {
            let heading = turn_towards(actor.rotation(), target - actor.position(), max_turn);
            actor.set_rotation(heading);
        }
        if !step_towards(actor, target, step, epsilon) {
            return Ok(false);
        }

        let name = actor.name().to_string();
        ctx.stage.destroy_actor(&name);
        ctx.log(format!("actor.{name}.destroy"));
        self.actor = None;
        self.exit_target = None;
        self.phase = ActorPhase::Invalid;
        Ok(true)
    }

    fn park_current(&mut self, ctx: &mut TickContext<'_>) {
        if let Some(mut actor) = self.actor.take() {
            actor.stop();
            ctx.log(format!("actor.{}.park", actor.name()));
            self.parked.push(actor);
        }
    }

    fn spawn_point(
        &self,
        slot: usize,
        ctx: &TickContext<'_>,
    ) -> Result<(String, Vec3), ConfigurationError> {
        let anchor = self
            .tuning
            .spawn_points
            .get(slot)
            .ok_or_else(|| ConfigurationError::MissingAnchor(format!("spawn point {slot}")))?;
        let position = ctx
            .stage
            .anchor(anchor)
            .ok_or_else(|| ConfigurationError::MissingAnchor(anchor.clone()))?;
        Ok((anchor.clone(), position))
    }

    fn interact_point(&self, ctx: &TickContext<'_>) -> Result<Vec3, ConfigurationError> {
        ctx.stage
            .anchor(&self.tuning.interact_point)
            .ok_or_else(|| ConfigurationError::MissingAnchor(self.tuning.interact_point.clone()))
    }
}

/// Moves `actor` up to `step` toward `target`; snaps and returns true once
/// within `epsilon`.
fn step_towards(actor: &mut Actor, target: Vec3, step: f32, epsilon: f32) -> bool {
    let offset = target - actor.position();
    let distance = offset.length();
    if distance > epsilon {
        let travel = step.min(distance);
        actor.set_position(actor.position() + offset / distance * travel);
    }
    if actor.position().distance(target) <= epsilon {
        actor.set_position(target);
        return true;
    }
    false
}

/// Yaw-only turn toward `direction`, limited to `max_angle` radians.
fn turn_towards(current: Quat, direction: Vec3, max_angle: f32) -> Quat {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() <= f32::EPSILON {
        return current;
    }
    let goal = Quat::from_rotation_y(flat.x.atan2(flat.z));
    let angle = current.angle_between(goal);
    if angle <= max_angle || angle <= f32::EPSILON {
        goal
    } else {
        current.slerp(goal, max_angle / angle)
    }
}
