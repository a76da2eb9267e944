//! Capability interfaces the runtime calls into. Rendering, physics, audio
//! playback and scene management live behind these traits so the narrative
//! core can run headless.

use std::fmt;

use fusebox_content::AudioClipDef;
use glam::{Quat, Vec3};

use crate::events::EventLog;
use crate::level_script::WorldCommand;

/// Opaque handle for one bindable transform on an actor model.
pub type TargetHandle = u32;

/// Pose sink for one actor model.
pub trait Rig {
    fn resolve_target(&self, bone: &str) -> Option<TargetHandle>;
    fn apply_pose(&mut self, target: TargetHandle, position: Option<Vec3>, rotation: Option<Quat>);
    fn apply_hands(&mut self, _target: TargetHandle, _left: f32, _right: f32) {}
    fn set_ik_weight(&mut self, _weight: f32) {}
}

/// Voice channel for one actor model.
pub trait AudioOutput {
    fn play(&mut self, clip: &AudioClipDef);
    fn stop(&mut self);
    fn seek(&mut self, time: f32);
    fn elapsed(&self) -> f32;
    fn is_playing(&self) -> bool;
}

/// Everything an instantiated actor owns on the engine side.
pub struct ActorModel {
    pub rig: Box<dyn Rig>,
    pub audio: Box<dyn AudioOutput>,
}

impl fmt::Debug for ActorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActorModel")
    }
}

/// Where an actor instance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorSource<'a> {
    /// Instantiate the named model at the given anchor.
    Model { model: &'a str, anchor: &'a str },
    /// Claim an actor that is already placed in the scene.
    Scene(&'a str),
}

/// Scene-level services: spawning, anchors, trigger volumes and level props.
pub trait Stage {
    fn instantiate(&mut self, character: &str, source: ActorSource<'_>) -> Option<ActorModel>;
    fn anchor(&self, name: &str) -> Option<Vec3>;
    fn has_trigger(&self, name: &str) -> bool;
    fn activate_trigger(&mut self, name: &str);
    fn deactivate_trigger(&mut self, name: &str);
    fn player_position(&self) -> Option<Vec3> {
        None
    }
    fn show_chat(&mut self, _text: &str) {}
    fn present_object(&mut self, _object: &str) {}
    fn destroy_actor(&mut self, _character: &str) {}
    fn world_command(&mut self, _command: &WorldCommand) {}
}

impl fmt::Debug for dyn Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Stage")
    }
}

/// Per-tick context handed down from the mission driver.
pub struct TickContext<'a> {
    pub stage: &'a mut dyn Stage,
    pub events: &'a mut EventLog,
}

impl<'a> TickContext<'a> {
    pub fn new(stage: &'a mut dyn Stage, events: &'a mut EventLog) -> Self {
        Self { stage, events }
    }

    pub fn log(&mut self, label: impl Into<String>) {
        self.events.push(label);
    }
}
