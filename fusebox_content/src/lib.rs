//! Immutable authored content: acting clips, audio envelopes, tasks, chats
//! and the characters that string them together.

pub mod character;
pub mod clip;
pub mod error;
pub mod store;
pub mod task;

pub use character::{
    CharacterDef, EnterType, ExitType, Interruptable, InterruptableClip, InterruptableKind,
    MissionDef,
};
pub use clip::{ActingClip, AudioClipDef, Hand, TargetTrack};
pub use error::ConfigurationError;
pub use store::{BoundClip, ClipStore, Content};
pub use task::{Chat, TaskDef, TaskKind, TaskListDef};
