//! In-memory stage used by the scenario runner and the tests. Audio is a
//! clock per actor that the runner advances; rigs only remember what was
//! applied to them.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use fusebox_content::AudioClipDef;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::level_script::WorldCommand;
use crate::services::{ActorModel, ActorSource, AudioOutput, Rig, Stage, TargetHandle};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageLayout {
    pub anchors: BTreeMap<String, Vec3>,
    pub triggers: Vec<String>,
    /// Actors already standing in the scene, claimable by name.
    pub scene_actors: Vec<String>,
    /// Bones every actor model exposes.
    pub bones: Vec<String>,
    pub player_position: Option<Vec3>,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceClock {
    pub clip: Option<String>,
    pub length: f32,
    pub elapsed: f32,
    pub playing: bool,
}

impl VoiceClock {
    fn advance(&mut self, dt: f32) {
        if !self.playing {
            return;
        }
        self.elapsed += dt;
        if self.elapsed >= self.length {
            self.elapsed = self.length;
            self.playing = false;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RigProbe {
    pub poses_applied: usize,
    pub last_pose: HashMap<TargetHandle, (Option<Vec3>, Option<Quat>)>,
    pub hands: HashMap<TargetHandle, (f32, f32)>,
    pub ik_weight: f32,
}

struct HeadlessRig {
    bones: HashMap<String, TargetHandle>,
    probe: Rc<RefCell<RigProbe>>,
}

impl Rig for HeadlessRig {
    fn resolve_target(&self, bone: &str) -> Option<TargetHandle> {
        self.bones.get(bone).copied()
    }

    fn apply_pose(&mut self, target: TargetHandle, position: Option<Vec3>, rotation: Option<Quat>) {
        let mut probe = self.probe.borrow_mut();
        probe.poses_applied += 1;
        probe.last_pose.insert(target, (position, rotation));
    }

    fn apply_hands(&mut self, target: TargetHandle, left: f32, right: f32) {
        self.probe.borrow_mut().hands.insert(target, (left, right));
    }

    fn set_ik_weight(&mut self, weight: f32) {
        self.probe.borrow_mut().ik_weight = weight;
    }
}

struct HeadlessAudio {
    clock: Rc<RefCell<VoiceClock>>,
}

impl AudioOutput for HeadlessAudio {
    fn play(&mut self, clip: &AudioClipDef) {
        let mut clock = self.clock.borrow_mut();
        clock.clip = Some(clip.name.clone());
        clock.length = clip.length;
        clock.elapsed = 0.0;
        clock.playing = clip.length > 0.0;
    }

    fn stop(&mut self) {
        self.clock.borrow_mut().playing = false;
    }

    fn seek(&mut self, time: f32) {
        let mut clock = self.clock.borrow_mut();
        clock.elapsed = time.clamp(0.0, clock.length);
    }

    fn elapsed(&self) -> f32 {
        self.clock.borrow().elapsed
    }

    fn is_playing(&self) -> bool {
        self.clock.borrow().playing
    }
}

#[derive(Debug, Default)]
pub struct HeadlessStage {
    layout: StageLayout,
    active_triggers: BTreeSet<String>,
    voices: BTreeMap<String, Rc<RefCell<VoiceClock>>>,
    rigs: BTreeMap<String, Rc<RefCell<RigProbe>>>,
    world: Vec<String>,
    chats: Vec<String>,
    presented: Vec<String>,
    destroyed: Vec<String>,
}

impl HeadlessStage {
    pub fn new(layout: StageLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    /// Runs every actor's audio clock forward by one tick.
    pub fn advance(&mut self, dt: f32) {
        for clock in self.voices.values() {
            clock.borrow_mut().advance(dt);
        }
    }

    pub fn set_player_position(&mut self, position: Option<Vec3>) {
        self.layout.player_position = position;
    }

    pub fn is_trigger_active(&self, name: &str) -> bool {
        self.active_triggers.contains(name)
    }

    pub fn voice(&self, character: &str) -> Option<VoiceClock> {
        self.voices.get(character).map(|clock| clock.borrow().clone())
    }

    pub fn rig(&self, character: &str) -> Option<RigProbe> {
        self.rigs.get(character).map(|probe| probe.borrow().clone())
    }

    pub fn world_commands(&self) -> &[String] {
        &self.world
    }

    pub fn chats(&self) -> &[String] {
        &self.chats
    }

    pub fn presented(&self) -> &[String] {
        &self.presented
    }

    pub fn destroyed(&self) -> &[String] {
        &self.destroyed
    }

    fn build_model(&mut self, character: &str) -> ActorModel {
        let bones = self
            .layout
            .bones
            .iter()
            .enumerate()
            .map(|(index, bone)| (bone.clone(), index as TargetHandle))
            .collect();
        let probe = Rc::new(RefCell::new(RigProbe::default()));
        let clock = Rc::new(RefCell::new(VoiceClock::default()));
        self.rigs.insert(character.to_string(), probe.clone());
        self.voices.insert(character.to_string(), clock.clone());
        ActorModel {
            rig: Box::new(HeadlessRig { bones, probe }),
            audio: Box::new(HeadlessAudio { clock }),
        }
    }
}

impl Stage for HeadlessStage {
    fn instantiate(&mut self, character: &str, source: ActorSource<'_>) -> Option<ActorModel> {
        match source {
            ActorSource::Model { model, anchor } => {
                self.layout.anchors.get(anchor)?;
                log::debug!("instantiate {model} for {character} at {anchor}");
            }
            ActorSource::Scene(name) => {
                if !self.layout.scene_actors.iter().any(|actor| actor == name) {
                    return None;
                }
            }
        }
        Some(self.build_model(character))
    }

    fn anchor(&self, name: &str) -> Option<Vec3> {
        self.layout.anchors.get(name).copied()
    }

    fn has_trigger(&self, name: &str) -> bool {
        self.layout.triggers.iter().any(|trigger| trigger == name)
    }

    fn activate_trigger(&mut self, name: &str) {
        self.active_triggers.insert(name.to_string());
    }

    fn deactivate_trigger(&mut self, name: &str) {
        self.active_triggers.remove(name);
    }

    fn player_position(&self) -> Option<Vec3> {
        self.layout.player_position
    }

    fn show_chat(&mut self, text: &str) {
        self.chats.push(text.to_string());
    }

    fn present_object(&mut self, object: &str) {
        self.presented.push(object.to_string());
    }

    fn destroy_actor(&mut self, character: &str) {
        self.destroyed.push(character.to_string());
        if let Some(clock) = self.voices.remove(character) {
            clock.borrow_mut().playing = false;
        }
        self.rigs.remove(character);
    }

    fn world_command(&mut self, command: &WorldCommand) {
        self.world.push(command.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> StageLayout {
        serde_json::from_str(
            r#"{
                "anchors": { "spawn0": [0.0, 0.0, 5.0], "interact": [0.0, 0.0, 0.0] },
                "triggers": ["power_room"],
                "scene_actors": ["Sam"],
                "bones": ["Root", "Head"]
            }"#,
        )
        .expect("layout")
    }

    #[test]
    fn audio_clock_runs_until_clip_length() {
        let mut stage = HeadlessStage::new(layout());
        let mut model = stage
            .instantiate(
                "bot",
                ActorSource::Model {
                    model: "drone",
                    anchor: "spawn0",
                },
            )
            .expect("model");
        model.audio.play(&AudioClipDef {
            name: "beep".to_string(),
            length: 0.05,
            fixed_update_rate: 1,
            volume: vec![1.0],
        });
        stage.advance(0.02);
        assert!(model.audio.is_playing());
        stage.advance(0.02);
        stage.advance(0.02);
        assert!(!model.audio.is_playing());
        assert_eq!(model.audio.elapsed(), 0.05);
    }

    #[test]
    fn unknown_sources_are_refused() {
        let mut stage = HeadlessStage::new(layout());
        assert!(stage
            .instantiate(
                "bot",
                ActorSource::Model {
                    model: "drone",
                    anchor: "nowhere",
                },
            )
            .is_none());
        assert!(stage.instantiate("sam", ActorSource::Scene("Dave")).is_none());
        let model = stage
            .instantiate("sam", ActorSource::Scene("Sam"))
            .expect("scene actor");
        assert_eq!(model.rig.resolve_target("Head"), Some(1));
    }
}
