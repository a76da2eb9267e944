//! Level-specific reactions to story beats: doors, props, grabbing rules and
//! early actor hand-offs keyed off the tasks the mission starts and
//! completes.

use std::cell::RefCell;
use std::fmt;

use fusebox_content::TaskDef;

use crate::tasks::TaskListener;

pub const PLUG_EXTENSION: &str = "plug_extension";
pub const SAM_TELEPORT_ANCHOR: &str = "teleport_sam";

/// Task names the level script reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryBeat {
    PickupStartPlug,
    FindExtension,
    GotoPowerRoom,
    SamIntro,
    FuseSneezingIntro,
    FuseSneezing,
    SecurityActivated,
    KillBot,
    AfterFuse,
    BotDeath,
    StartButtonFinal,
}

impl StoryBeat {
    pub fn from_task_name(name: &str) -> Option<Self> {
        let beat = match name {
            "PickupStartPlug" => StoryBeat::PickupStartPlug,
            "FindExtension" => StoryBeat::FindExtension,
            "GotoPowerRoom" => StoryBeat::GotoPowerRoom,
            "SamIntro" => StoryBeat::SamIntro,
            "FuseSneezingIntro" => StoryBeat::FuseSneezingIntro,
            "FuseSneezing" => StoryBeat::FuseSneezing,
            "SecurityActivated" => StoryBeat::SecurityActivated,
            "KillBot" => StoryBeat::KillBot,
            "AfterFuse" => StoryBeat::AfterFuse,
            "BotDeath" => StoryBeat::BotDeath,
            "StartButtonFinal" => StoryBeat::StartButtonFinal,
            _ => return None,
        };
        Some(beat)
    }

    pub fn on_started(self) -> Vec<ScheduledCommand> {
        use WorldCommand::*;
        match self {
            StoryBeat::PickupStartPlug => vec![ScheduledCommand::after(3.0, OpenDoor(0))],
            StoryBeat::FindExtension => {
                vec![ScheduledCommand::now(RevealObject(PLUG_EXTENSION.to_string()))]
            }
            StoryBeat::GotoPowerRoom => vec![ScheduledCommand::after(1.0, OpenDoor(1))],
            StoryBeat::SamIntro => vec![
                ScheduledCommand::now(CloseDoor(1)),
                ScheduledCommand::after(
                    14.0,
                    TeleportActor {
                        anchor: SAM_TELEPORT_ANCHOR.to_string(),
                    },
                ),
                ScheduledCommand::now(AllowGrabbing(false)),
            ],
            StoryBeat::FuseSneezingIntro => vec![ScheduledCommand::now(AllowGrabbing(false))],
            StoryBeat::FuseSneezing => vec![ScheduledCommand::now(ActivateFuses)],
            StoryBeat::SecurityActivated => vec![ScheduledCommand::now(OpenDoor(2))],
            StoryBeat::KillBot => vec![ScheduledCommand::now(CloseDoor(2))],
            StoryBeat::AfterFuse | StoryBeat::BotDeath | StoryBeat::StartButtonFinal => Vec::new(),
        }
    }

    pub fn on_completed(self) -> Vec<ScheduledCommand> {
        use WorldCommand::*;
        match self {
            StoryBeat::GotoPowerRoom
            | StoryBeat::AfterFuse
            | StoryBeat::SecurityActivated
            | StoryBeat::BotDeath => vec![ScheduledCommand::now(FinishActor)],
            StoryBeat::StartButtonFinal => vec![
                ScheduledCommand::now(FinishActor),
                ScheduledCommand::now(ShowBlueScreen),
            ],
            StoryBeat::SamIntro | StoryBeat::FuseSneezingIntro => {
                vec![ScheduledCommand::now(AllowGrabbing(true))]
            }
            StoryBeat::FuseSneezing => vec![ScheduledCommand::after(1.0, OpenDoor(1))],
            StoryBeat::KillBot => vec![ScheduledCommand::after(1.0, OpenDoor(2))],
            StoryBeat::PickupStartPlug | StoryBeat::FindExtension => Vec::new(),
        }
    }
}

/// Something the level asks the world (or the mission) to do.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldCommand {
    OpenDoor(usize),
    CloseDoor(usize),
    AllowGrabbing(bool),
    RevealObject(String),
    ActivateFuses,
    TeleportActor { anchor: String },
    /// Hand the mission over to the next actor.
    FinishActor,
    ShowBlueScreen,
}

impl fmt::Display for WorldCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldCommand::OpenDoor(index) => write!(f, "door.open {index}"),
            WorldCommand::CloseDoor(index) => write!(f, "door.close {index}"),
            WorldCommand::AllowGrabbing(allow) => write!(f, "grabbing {allow}"),
            WorldCommand::RevealObject(object) => write!(f, "reveal {object}"),
            WorldCommand::ActivateFuses => f.write_str("fuses.activate"),
            WorldCommand::TeleportActor { anchor } => write!(f, "teleport {anchor}"),
            WorldCommand::FinishActor => f.write_str("finish_actor"),
            WorldCommand::ShowBlueScreen => f.write_str("blue_screen"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCommand {
    pub delay: f32,
    pub command: WorldCommand,
}

impl ScheduledCommand {
    pub fn now(command: WorldCommand) -> Self {
        Self::after(0.0, command)
    }

    pub fn after(delay: f32, command: WorldCommand) -> Self {
        Self { delay, command }
    }
}

/// Task listener that turns story beats into world commands. The mission
/// driver drains the queue once per tick.
#[derive(Debug, Default)]
pub struct LevelScript {
    queued: RefCell<Vec<ScheduledCommand>>,
}

impl LevelScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<ScheduledCommand> {
        self.queued.borrow_mut().drain(..).collect()
    }

    fn enqueue(&self, commands: Vec<ScheduledCommand>) {
        self.queued.borrow_mut().extend(commands);
    }
}

impl TaskListener for LevelScript {
    fn task_started(&self, task: &TaskDef) {
        if let Some(beat) = StoryBeat::from_task_name(&task.name) {
            self.enqueue(beat.on_started());
        }
    }

    fn task_completed(&self, task: &TaskDef) {
        if let Some(beat) = StoryBeat::from_task_name(&task.name) {
            self.enqueue(beat.on_completed());
        }
    }
}

#[cfg(test)]
mod tests {
    use fusebox_content::TaskKind;

    use super::*;

    fn task(name: &str) -> TaskDef {
        TaskDef {
            name: name.to_string(),
            description: String::new(),
            kind: TaskKind::FromScript,
            object: String::new(),
        }
    }

    #[test]
    fn unknown_task_names_are_ignored() {
        let script = LevelScript::new();
        script.task_started(&task("Wander"));
        script.task_completed(&task("Wander"));
        assert!(script.drain().is_empty());
        assert_eq!(StoryBeat::from_task_name("samintro"), None);
    }

    #[test]
    fn sam_intro_closes_door_and_schedules_teleport() {
        let script = LevelScript::new();
        script.task_started(&task("SamIntro"));
        let commands = script.drain();
        assert_eq!(commands[0], ScheduledCommand::now(WorldCommand::CloseDoor(1)));
        assert_eq!(commands[1].delay, 14.0);
        assert_eq!(commands[2].command, WorldCommand::AllowGrabbing(false));
        assert!(script.drain().is_empty());

        script.task_completed(&task("SamIntro"));
        assert_eq!(
            script.drain(),
            vec![ScheduledCommand::now(WorldCommand::AllowGrabbing(true))]
        );
    }

    #[test]
    fn final_button_finishes_actor_and_shows_blue_screen() {
        let commands = StoryBeat::StartButtonFinal.on_completed();
        let labels: Vec<String> = commands
            .iter()
            .map(|scheduled| scheduled.command.to_string())
            .collect();
        assert_eq!(labels, vec!["finish_actor", "blue_screen"]);
    }
}
