use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::character::MissionDef;
use crate::clip::{ActingClip, AudioClipDef};
use crate::error::ConfigurationError;
use crate::task::Chat;

/// An acting clip paired with the audio it is about to be played with.
///
/// The same gesture is often voiced by several audio variants, so the pairing
/// is made per play request instead of being stored on the clip.
#[derive(Debug, Clone, Default)]
pub struct BoundClip {
    pub acting: Option<Rc<ActingClip>>,
    pub audio: Option<Rc<AudioClipDef>>,
}

impl BoundClip {
    pub fn is_empty(&self) -> bool {
        self.acting.is_none() && self.audio.is_none()
    }

    pub fn label(&self) -> String {
        let acting = self.acting.as_ref().map(|clip| clip.name.as_str());
        let audio = self.audio.as_ref().map(|clip| clip.name.as_str());
        format!("{} {}", acting.unwrap_or("<none>"), audio.unwrap_or("<silent>"))
    }
}

/// Read-only index over authored clips.
#[derive(Debug, Default)]
pub struct ClipStore {
    acting: HashMap<String, Rc<ActingClip>>,
    audio: HashMap<String, Rc<AudioClipDef>>,
}

impl ClipStore {
    pub fn new<A, U>(acting: A, audio: U) -> Result<Self, ConfigurationError>
    where
        A: IntoIterator<Item = ActingClip>,
        U: IntoIterator<Item = AudioClipDef>,
    {
        let mut store = ClipStore::default();
        for clip in acting {
            clip.validate()?;
            if store.acting.contains_key(&clip.name) {
                return Err(ConfigurationError::DuplicateClip(clip.name));
            }
            store.acting.insert(clip.name.clone(), Rc::new(clip));
        }
        for clip in audio {
            if store.audio.contains_key(&clip.name) {
                return Err(ConfigurationError::DuplicateClip(clip.name));
            }
            store.audio.insert(clip.name.clone(), Rc::new(clip));
        }
        Ok(store)
    }

    pub fn acting(&self, name: &str) -> Result<Rc<ActingClip>, ConfigurationError> {
        self.acting
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownActingClip(name.to_string()))
    }

    pub fn audio(&self, name: &str) -> Result<Rc<AudioClipDef>, ConfigurationError> {
        self.audio
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownAudioClip(name.to_string()))
    }

    pub fn bind(
        &self,
        acting: Option<&str>,
        audio: Option<&str>,
    ) -> Result<BoundClip, ConfigurationError> {
        Ok(BoundClip {
            acting: acting.map(|name| self.acting(name)).transpose()?,
            audio: audio.map(|name| self.audio(name)).transpose()?,
        })
    }

    pub fn bind_chat(&self, chat: &Chat) -> Result<BoundClip, ConfigurationError> {
        self.bind(chat.acting_clip.as_deref(), chat.audio_clip.as_deref())
    }

    pub fn acting_len(&self) -> usize {
        self.acting.len()
    }

    pub fn audio_len(&self) -> usize {
        self.audio.len()
    }
}

/// One authored content bundle: every clip plus the mission that uses them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub acting_clips: Vec<ActingClip>,
    #[serde(default)]
    pub audio_clips: Vec<AudioClipDef>,
    #[serde(default)]
    pub mission: MissionDef,
}

impl Content {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing content bundle json")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read content bundle: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse content bundle: {}", path.display()))
    }

    pub fn clip_store(&self) -> Result<ClipStore, ConfigurationError> {
        ClipStore::new(self.acting_clips.clone(), self.audio_clips.clone())
    }

    /// Builds the store and checks every reference the mission makes into it.
    pub fn validate(&self) -> Result<ClipStore, ConfigurationError> {
        let store = self.clip_store()?;
        if self.mission.characters.is_empty() {
            return Err(ConfigurationError::EmptyMission);
        }
        for character in &self.mission.characters {
            if character.task_lists.is_empty() {
                return Err(ConfigurationError::EmptyCharacter(character.name.clone()));
            }
            for list in &character.task_lists {
                if list.waits_for_chat() && list.start_chat.is_empty() {
                    return Err(ConfigurationError::ChatlessWait(list.title.clone()));
                }
                for chat in list.chats() {
                    store.bind_chat(chat)?;
                }
            }
            for interruptable in &character.interruptables {
                for clip in &interruptable.clips {
                    store.bind(Some(&clip.acting_clip), clip.audio_clip.as_deref())?;
                }
            }
        }
        Ok(store)
    }
}
