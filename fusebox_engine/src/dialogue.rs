use fusebox_content::{BoundClip, Chat, ClipStore, ConfigurationError};

/// Which of a task list's chat sequences is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Start,
    Complete,
}

impl ChatPhase {
    pub fn label(self) -> &'static str {
        match self {
            ChatPhase::Start => "start",
            ChatPhase::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone)]
pub enum DialogueStep {
    /// A new line is up; the caller presents it and plays `clip`.
    Line {
        index: usize,
        chat: Chat,
        clip: BoundClip,
    },
    /// Every line of the sequence has been shown.
    Finished(ChatPhase),
}

/// Steps through one chat sequence on the presentation tick.
///
/// A line lasts for its audio clip's length, or its own `duration` when it has
/// no audio. When that runs out the driver waits for the actor to fall quiet
/// before moving on, so trailing speech is never cut off.
#[derive(Debug, Clone)]
pub struct DialogueDriver {
    phase: ChatPhase,
    chats: Vec<Chat>,
    index: Option<usize>,
    current: Option<Chat>,
    timer: f32,
    pending_next: bool,
    queued_complete: Option<Vec<Chat>>,
}

impl Default for DialogueDriver {
    fn default() -> Self {
        Self {
            phase: ChatPhase::Start,
            chats: Vec::new(),
            index: None,
            current: None,
            timer: 0.0,
            pending_next: false,
            queued_complete: None,
        }
    }
}

impl DialogueDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&Chat> {
        self.current.as_ref()
    }

    pub fn timer(&self) -> f32 {
        self.timer
    }

    pub fn is_waiting_for_quiet(&self) -> bool {
        self.pending_next
    }

    pub fn has_queued_complete(&self) -> bool {
        self.queued_complete.is_some()
    }

    /// Whether nothing is left to show until the next `start`/`complete`.
    pub fn is_idle(&self) -> bool {
        !self.pending_next && !self.line_running() && self.queued_complete.is_none()
    }

    /// Begins a sequence from its first line. Any line in progress is dropped.
    pub fn start(&mut self, phase: ChatPhase, chats: Vec<Chat>) {
        self.phase = phase;
        self.chats = chats;
        self.index = None;
        self.current = None;
        self.timer = 0.0;
        self.pending_next = true;
        self.queued_complete = None;
    }

    /// Switches to the completion chat. A non-interruptible line that is still
    /// speaking finishes first; returns whether the switch was deferred.
    pub fn complete(&mut self, chats: Vec<Chat>) -> bool {
        let protected = self.line_running()
            && self.current.as_ref().is_some_and(|chat| !chat.interruptible);
        if protected {
            self.queued_complete = Some(chats);
            return true;
        }
        self.start(ChatPhase::Complete, chats);
        false
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn tick(
        &mut self,
        dt: f32,
        quiet: bool,
        store: &ClipStore,
    ) -> Result<Option<DialogueStep>, ConfigurationError> {
        if self.pending_next {
            if !quiet {
                return Ok(None);
            }
            self.pending_next = false;
            return self.show_next(store).map(Some);
        }

        if self.line_running() {
            self.timer = (self.timer - dt).max(0.0);
            if self.timer <= 0.0 {
                self.pending_next = true;
                if let Some(chats) = self.queued_complete.take() {
                    self.start(ChatPhase::Complete, chats);
                }
            }
        }
        Ok(None)
    }

    fn line_running(&self) -> bool {
        self.index.is_some_and(|index| index < self.chats.len()) && !self.pending_next
    }

    fn show_next(&mut self, store: &ClipStore) -> Result<DialogueStep, ConfigurationError> {
        let index = self.index.map_or(0, |index| index + 1);
        self.index = Some(index);
        let Some(chat) = self.chats.get(index).cloned() else {
            self.current = None;
            self.timer = 0.0;
            return Ok(DialogueStep::Finished(self.phase));
        };
        let clip = store.bind_chat(&chat)?;
        self.timer = match clip.audio.as_ref() {
            Some(audio) => audio.length,
            None => chat.duration,
        }
        .max(0.0);
        self.current = Some(chat.clone());
        Ok(DialogueStep::Line { index, chat, clip })
    }
}
