use std::rc::Rc;

use fusebox_content::AudioClipDef;

/// Derives how far an actor's mouth is open from the playing clip's
/// pre-computed volume envelope.
#[derive(Debug, Clone)]
pub struct MouthTracker {
    volume_mult: f32,
    mouth_speed: f32,
    envelope: Option<Rc<AudioClipDef>>,
    next_sample: usize,
    last_sample: Option<usize>,
    countdown: u32,
    target: f32,
    smoothed: f32,
}

impl MouthTracker {
    pub fn new(volume_mult: f32, mouth_speed: f32) -> Self {
        Self {
            volume_mult,
            mouth_speed,
            envelope: None,
            next_sample: 0,
            last_sample: None,
            countdown: 0,
            target: 0.0,
            smoothed: 0.0,
        }
    }

    pub fn play(&mut self, clip: Option<Rc<AudioClipDef>>) {
        self.envelope = clip;
        self.next_sample = 0;
        self.last_sample = None;
        self.countdown = 0;
        if self.envelope.is_none() {
            self.target = 0.0;
        }
    }

    pub fn stop(&mut self) {
        self.envelope = None;
        self.target = 0.0;
    }

    /// Latest envelope reading scaled by the volume multiplier.
    pub fn speech_volume(&self) -> f32 {
        self.target
    }

    /// Speech volume smoothed toward the latest reading.
    pub fn mouth_open(&self) -> f32 {
        self.smoothed
    }

    /// Index of the envelope sample read most recently.
    pub fn sample_index(&self) -> Option<usize> {
        self.last_sample
    }

    /// Eases the mouth toward its target and reads the next envelope sample
    /// once every `fixed_update_rate` ticks while audio plays.
    pub fn tick(&mut self, dt: f32, audio_playing: bool) {
        let step = (self.mouth_speed * dt).clamp(0.0, 1.0);
        self.smoothed += (self.target - self.smoothed) * step;

        let Some(envelope) = self.envelope.clone().filter(|_| audio_playing) else {
            self.target = 0.0;
            return;
        };
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return;
        }
        self.countdown = envelope.fixed_update_rate.max(1);

        if envelope.volume.is_empty() {
            self.target = 0.0;
            return;
        }
        let index = self.next_sample.min(envelope.volume.len() - 1);
        self.target = envelope.sample(index) * self.volume_mult;
        self.last_sample = Some(index);
        self.next_sample = index + 1;
        if self.next_sample >= envelope.volume.len() {
            self.next_sample = 0;
        }
    }
}
