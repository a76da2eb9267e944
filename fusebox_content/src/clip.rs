//! Authored acting clips and audio envelopes.
//!
//! An acting clip is a fixed-rate time series: one sample per fixed tick for
//! every target (bone) it drives. Sample accessors clamp the frame index into
//! `[0, frame_count - 1]` so playback code can run past the end of a clip
//! without bounds bookkeeping.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Which hand channel of a target to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Left,
    Right,
}

/// Samples for one bone-like target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetTrack {
    #[serde(default)]
    pub name: String,
    pub bone: String,
    #[serde(default)]
    pub apply_position: bool,
    #[serde(default)]
    pub apply_rotation: bool,
    #[serde(default)]
    pub positions: Vec<Vec3>,
    #[serde(default)]
    pub rotations: Vec<Quat>,
    #[serde(default)]
    pub left_trigger: Vec<f32>,
    #[serde(default)]
    pub right_trigger: Vec<f32>,
}

impl TargetTrack {
    pub fn position(&self, frame: usize) -> Vec3 {
        clamped(&self.positions, frame).unwrap_or(Vec3::ZERO)
    }

    pub fn rotation(&self, frame: usize) -> Quat {
        clamped(&self.rotations, frame).unwrap_or(Quat::IDENTITY)
    }

    pub fn trigger(&self, hand: Hand, frame: usize) -> f32 {
        let samples = match hand {
            Hand::Left => &self.left_trigger,
            Hand::Right => &self.right_trigger,
        };
        clamped(samples, frame).unwrap_or(0.0)
    }

    pub fn has_hands(&self) -> bool {
        !self.left_trigger.is_empty() || !self.right_trigger.is_empty()
    }
}

fn clamped<T: Copy>(samples: &[T], frame: usize) -> Option<T> {
    let last = samples.len().checked_sub(1)?;
    samples.get(frame.min(last)).copied()
}

/// Immutable multi-target pose animation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActingClip {
    pub name: String,
    pub frame_count: usize,
    #[serde(default)]
    pub looped: bool,
    /// Explicit playback length in seconds; zero means "derive from frames".
    #[serde(default)]
    pub override_time: f32,
    #[serde(default)]
    pub targets: Vec<TargetTrack>,
}

impl ActingClip {
    pub fn last_frame(&self) -> usize {
        self.frame_count.saturating_sub(1)
    }

    pub fn duration(&self, fixed_delta: f32) -> f32 {
        if self.override_time > 0.0 {
            self.override_time
        } else {
            self.frame_count as f32 * fixed_delta
        }
    }

    /// Rejects clips whose applied channels are shorter than the frame count.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let malformed = |reason: String| ConfigurationError::MalformedClip {
            clip: self.name.clone(),
            reason,
        };
        if self.frame_count == 0 {
            return Err(malformed("frame count is zero".to_string()));
        }
        for track in &self.targets {
            if track.apply_position && track.positions.len() < self.frame_count {
                return Err(malformed(format!(
                    "target `{}` has {} positions for {} frames",
                    track.bone,
                    track.positions.len(),
                    self.frame_count
                )));
            }
            if track.apply_rotation && track.rotations.len() < self.frame_count {
                return Err(malformed(format!(
                    "target `{}` has {} rotations for {} frames",
                    track.bone,
                    track.rotations.len(),
                    self.frame_count
                )));
            }
        }
        Ok(())
    }
}

fn default_fixed_update_rate() -> u32 {
    2
}

/// An audio asset reference with its pre-computed volume envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioClipDef {
    pub name: String,
    /// Playback length in seconds.
    pub length: f32,
    /// Fixed ticks per envelope sample.
    #[serde(default = "default_fixed_update_rate")]
    pub fixed_update_rate: u32,
    #[serde(default)]
    pub volume: Vec<f32>,
}

impl AudioClipDef {
    pub fn sample(&self, index: usize) -> f32 {
        self.volume.get(index).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(frames: usize) -> TargetTrack {
        TargetTrack {
            name: "head".to_string(),
            bone: "Head".to_string(),
            apply_position: true,
            apply_rotation: false,
            positions: (0..frames).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect(),
            rotations: Vec::new(),
            left_trigger: vec![0.0, 0.5],
            right_trigger: Vec::new(),
        }
    }

    #[test]
    fn samples_clamp_to_last_frame() {
        let track = track(3);
        assert_eq!(track.position(1), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(track.position(99), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(track.rotation(5), Quat::IDENTITY);
        assert_eq!(track.trigger(Hand::Left, 7), 0.5);
        assert_eq!(track.trigger(Hand::Right, 0), 0.0);
    }

    #[test]
    fn validate_rejects_short_tracks() {
        let clip = ActingClip {
            name: "wave".to_string(),
            frame_count: 4,
            looped: false,
            override_time: 0.0,
            targets: vec![track(3)],
        };
        assert!(matches!(
            clip.validate(),
            Err(ConfigurationError::MalformedClip { .. })
        ));
    }

    #[test]
    fn duration_prefers_override() {
        let mut clip = ActingClip {
            name: "idle".to_string(),
            frame_count: 50,
            looped: true,
            override_time: 0.0,
            targets: vec![track(50)],
        };
        assert!((clip.duration(0.02) - 1.0).abs() < 1e-6);
        clip.override_time = 2.5;
        assert_eq!(clip.duration(0.02), 2.5);
    }
}
