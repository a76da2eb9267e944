use thiserror::Error;

/// Static authoring mistakes detected when content is loaded, a task list
/// starts, or a clip is bound for playback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown acting clip `{0}`")]
    UnknownActingClip(String),
    #[error("unknown audio clip `{0}`")]
    UnknownAudioClip(String),
    #[error("duplicate clip name `{0}`")]
    DuplicateClip(String),
    #[error("acting clip `{clip}` is malformed: {reason}")]
    MalformedClip { clip: String, reason: String },
    #[error("actor `{actor}` has no target named `{bone}` (clip `{clip}`)")]
    MissingTarget {
        actor: String,
        clip: String,
        bone: String,
    },
    #[error("task `{task}` in list `{list}` waits on unknown trigger `{trigger}`")]
    UnknownTrigger {
        list: String,
        task: String,
        trigger: String,
    },
    #[error("task list `{0}` waits for a chat but has no start chat")]
    ChatlessWait(String),
    #[error("mission has no characters")]
    EmptyMission,
    #[error("character `{0}` has no task lists")]
    EmptyCharacter(String),
    #[error("cannot find actor for character `{0}`")]
    MissingActor(String),
    #[error("no anchor named `{0}`")]
    MissingAnchor(String),
    #[error("character `{character}` has no interruptable `{name}` with clip {clip}")]
    MissingInterruptable {
        character: String,
        name: String,
        clip: usize,
    },
}
