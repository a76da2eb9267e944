use serde::{Deserialize, Serialize};

/// The world condition that completes a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    FromScript,
    GrabObject,
    ReachedTrigger,
    WaitForChatToFinish,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::FromScript => "from_script",
            TaskKind::GrabObject => "grab_object",
            TaskKind::ReachedTrigger => "reached_trigger",
            TaskKind::WaitForChatToFinish => "wait_for_chat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: TaskKind,
    /// Script signal, grabbed object or trigger volume this task listens for.
    #[serde(default)]
    pub object: String,
}

/// One spoken (or silent) line of a chat sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub acting_clip: Option<String>,
    #[serde(default)]
    pub audio_clip: Option<String>,
    #[serde(default)]
    pub interruptible: bool,
    /// Fallback duration when there is no audio clip.
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub grab_object: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskListDef {
    pub title: String,
    #[serde(default)]
    pub start_chat: Vec<Chat>,
    #[serde(default)]
    pub complete_chat: Vec<Chat>,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

impl TaskListDef {
    pub fn waits_for_chat(&self) -> bool {
        self.tasks
            .iter()
            .any(|task| task.kind == TaskKind::WaitForChatToFinish)
    }

    pub fn chats(&self) -> impl Iterator<Item = &Chat> {
        self.start_chat.iter().chain(self.complete_chat.iter())
    }
}
