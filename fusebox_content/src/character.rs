use serde::{Deserialize, Serialize};

use crate::task::TaskListDef;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnterType {
    #[default]
    None,
    WalkToSpawnPoint,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitType {
    #[default]
    None,
    BackToSpawnPoint,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptableKind {
    #[default]
    None,
    PersonalSpaceBreach,
}

fn default_min_time() -> f32 {
    3.0
}

fn default_start_time() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptableClip {
    /// Minimum time the clip holds before the actor may resume.
    #[serde(default = "default_min_time")]
    pub min_time: f32,
    #[serde(default)]
    pub audio_clip: Option<String>,
    pub acting_clip: String,
}

/// A named override sequence that outside events can trigger on an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interruptable {
    pub name: String,
    #[serde(default)]
    pub kind: InterruptableKind,
    /// Delay before the interruption starts, and before it is lifted again.
    #[serde(default = "default_start_time")]
    pub start_time: f32,
    #[serde(default)]
    pub clips: Vec<InterruptableClip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDef {
    pub name: String,
    /// Model to instantiate; `None` means the actor already stands in the scene.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub enter: EnterType,
    #[serde(default)]
    pub exit: ExitType,
    #[serde(default)]
    pub use_existing_character: bool,
    #[serde(default)]
    pub name_in_scene: Option<String>,
    #[serde(default = "default_true")]
    pub rotate_on_exit: bool,
    #[serde(default)]
    pub task_lists: Vec<TaskListDef>,
    #[serde(default)]
    pub interruptables: Vec<Interruptable>,
}

impl CharacterDef {
    pub fn interruptable(&self, kind: InterruptableKind) -> Option<&Interruptable> {
        self.interruptables
            .iter()
            .find(|interruptable| interruptable.kind == kind)
    }

    pub fn interruptable_named(&self, name: &str) -> Option<&Interruptable> {
        self.interruptables
            .iter()
            .find(|interruptable| interruptable.name == name)
    }
}

/// Ordered queue of characters that make up one playthrough.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionDef {
    #[serde(default)]
    pub characters: Vec<CharacterDef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interruptable_lookup_by_kind_and_name() {
        let json = r#"{
            "name": "sam",
            "interruptables": [
                { "name": "cough", "clips": [{ "acting_clip": "cough" }] },
                {
                    "name": "back_off",
                    "kind": "personal_space_breach",
                    "start_time": 0.5,
                    "clips": [{ "acting_clip": "shoo", "audio_clip": "shoo_vo" }]
                }
            ]
        }"#;
        let def: CharacterDef = serde_json::from_str(json).expect("parse character");
        assert!(def.rotate_on_exit);
        assert_eq!(def.enter, EnterType::None);

        let breach = def
            .interruptable(InterruptableKind::PersonalSpaceBreach)
            .expect("breach interruptable");
        assert_eq!(breach.name, "back_off");
        assert_eq!(breach.start_time, 0.5);
        assert_eq!(breach.clips[0].min_time, 3.0);

        let cough = def.interruptable_named("cough").expect("cough");
        assert_eq!(cough.kind, InterruptableKind::None);
        assert_eq!(cough.start_time, 1.0);
    }
}
