//! Fixed-rate acting clip playback with crossfades.
//!
//! The player advances every clip it samples by exactly one frame per fixed
//! tick. A play request while something is already playing arms a crossfade:
//! the outgoing clip keeps advancing while the incoming clip starts at frame
//! 0, and the blend weight (1 = fully outgoing, 0 = fully incoming) decays
//! linearly over the configured blend time. Tracks are paired by bone; a bone
//! only one of the two clips drives keeps that clip's pose for the whole
//! crossfade. Entering and leaving idle fades the whole rig's IK weight over
//! the same time.

use std::rc::Rc;

use fusebox_content::{ActingClip, ConfigurationError, Hand, TargetTrack};
use glam::{Quat, Vec3};

use crate::services::{Rig, TargetHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendState {
    Idle,
    Playing,
    Blending,
}

/// Notable transitions reported by [`BlendPlayer::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendEvent {
    /// The crossfade finished and the incoming clip is now the only one.
    Swapped,
    /// A looped clip reached its last frame and re-armed a self-blend.
    Looped,
    /// A one-shot clip ended; the rig fades back to idle.
    Finished,
}

/// One target's sampled transform and hand triggers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub hands: Option<(f32, f32)>,
}

impl Pose {
    pub const EMPTY: Pose = Pose {
        position: None,
        rotation: None,
        hands: None,
    };

    pub fn sample(track: &TargetTrack, frame: usize) -> Self {
        Pose {
            position: track.apply_position.then(|| track.position(frame)),
            rotation: track.apply_rotation.then(|| track.rotation(frame)),
            hands: track.has_hands().then(|| {
                (
                    track.trigger(Hand::Left, frame),
                    track.trigger(Hand::Right, frame),
                )
            }),
        }
    }

    fn apply(&self, rig: &mut dyn Rig, target: TargetHandle) {
        if self.position.is_some() || self.rotation.is_some() {
            rig.apply_pose(target, self.position, self.rotation);
        }
        if let Some((left, right)) = self.hands {
            rig.apply_hands(target, left, right);
        }
    }
}

/// Interpolates between two poses. A weight of 1 yields `outgoing` exactly and
/// a weight of 0 yields `incoming` exactly; channels present on one side only
/// pass through unchanged.
pub fn blend_pose(outgoing: &Pose, incoming: &Pose, weight: f32) -> Pose {
    let weight = weight.clamp(0.0, 1.0);
    Pose {
        position: blend_channel(outgoing.position, incoming.position, weight, |a, b, t| {
            b.lerp(a, t)
        }),
        rotation: blend_channel(outgoing.rotation, incoming.rotation, weight, |a, b, t| {
            b.slerp(a, t)
        }),
        hands: blend_channel(outgoing.hands, incoming.hands, weight, |a, b, t| {
            (b.0 + (a.0 - b.0) * t, b.1 + (a.1 - b.1) * t)
        }),
    }
}

fn blend_channel<T: Copy>(
    outgoing: Option<T>,
    incoming: Option<T>,
    weight: f32,
    mix: impl Fn(T, T, f32) -> T,
) -> Option<T> {
    match (outgoing, incoming) {
        (Some(a), Some(b)) => Some(if weight >= 1.0 {
            a
        } else if weight <= 0.0 {
            b
        } else {
            mix(a, b, weight)
        }),
        (a, b) => a.or(b),
    }
}

#[derive(Debug, Clone)]
struct ClipCursor {
    clip: Rc<ActingClip>,
    frame: usize,
}

impl ClipCursor {
    fn new(clip: Rc<ActingClip>) -> Self {
        Self { clip, frame: 0 }
    }

    fn at_end(&self) -> bool {
        self.frame >= self.clip.last_frame()
    }

    fn advance(&mut self) {
        if !self.at_end() {
            self.frame += 1;
        }
    }
}

/// Resolves every track of `clip` against the actor's rig, in track order.
pub fn resolve_targets(
    clip: &ActingClip,
    rig: &dyn Rig,
    actor: &str,
) -> Result<Vec<TargetHandle>, ConfigurationError> {
    clip.targets
        .iter()
        .map(|track| {
            rig.resolve_target(&track.bone)
                .ok_or_else(|| ConfigurationError::MissingTarget {
                    actor: actor.to_string(),
                    clip: clip.name.clone(),
                    bone: track.bone.clone(),
                })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct BlendPlayer {
    blend_time: f32,
    current: Option<ClipCursor>,
    incoming: Option<ClipCursor>,
    blend_weight: f32,
    ik_fade: f32,
    ik_fading_in: bool,
    ik_weight: f32,
    targets: Vec<TargetHandle>,
    outgoing_targets: Vec<TargetHandle>,
}

impl BlendPlayer {
    pub fn new(blend_time: f32) -> Self {
        Self {
            blend_time: blend_time.max(f32::EPSILON),
            current: None,
            incoming: None,
            blend_weight: 0.0,
            ik_fade: 0.0,
            ik_fading_in: false,
            ik_weight: 0.0,
            targets: Vec::new(),
            outgoing_targets: Vec::new(),
        }
    }

    pub fn state(&self) -> BlendState {
        match (&self.current, &self.incoming) {
            (None, _) => BlendState::Idle,
            (Some(_), Some(_)) => BlendState::Blending,
            (Some(_), None) => BlendState::Playing,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_blending(&self) -> bool {
        self.incoming.is_some() && self.blend_weight > 0.0
    }

    pub fn is_fading_ik(&self) -> bool {
        self.ik_fade > 0.0
    }

    pub fn blend_weight(&self) -> f32 {
        self.blend_weight
    }

    pub fn ik_weight(&self) -> f32 {
        self.ik_weight
    }

    pub fn current_frame(&self) -> usize {
        self.current.as_ref().map(|cursor| cursor.frame).unwrap_or(0)
    }

    pub fn incoming_frame(&self) -> Option<usize> {
        self.incoming.as_ref().map(|cursor| cursor.frame)
    }

    /// The clip that will be authoritative once any crossfade completes.
    pub fn active_clip(&self) -> Option<&Rc<ActingClip>> {
        self.incoming
            .as_ref()
            .or(self.current.as_ref())
            .map(|cursor| &cursor.clip)
    }

    pub fn targets(&self) -> &[TargetHandle] {
        &self.targets
    }

    pub fn play(
        &mut self,
        clip: Rc<ActingClip>,
        rig: &mut dyn Rig,
        actor: &str,
    ) -> Result<(), ConfigurationError> {
        let targets = resolve_targets(&clip, rig, actor)?;
        if self.current.is_some() {
            // A request during a crossfade replaces the incoming clip only.
            if self.incoming.is_none() {
                self.outgoing_targets = std::mem::take(&mut self.targets);
            }
            self.incoming = Some(ClipCursor::new(clip));
            self.blend_weight = 1.0;
        } else {
            self.current = Some(ClipCursor::new(clip));
            self.incoming = None;
            self.outgoing_targets.clear();
            self.blend_weight = 0.0;
            self.ik_fade = 1.0;
            self.ik_fading_in = true;
            self.ik_weight = 0.0;
            rig.set_ik_weight(0.0);
        }
        self.targets = targets;
        Ok(())
    }

    /// Moves the most recently requested clip to `frame` (clamped).
    pub fn seek_frame(&mut self, frame: usize) {
        let cursor = match self.incoming.as_mut() {
            Some(cursor) => cursor,
            None => match self.current.as_mut() {
                Some(cursor) => cursor,
                None => return,
            },
        };
        cursor.frame = frame.min(cursor.clip.last_frame());
    }

    pub fn tick(&mut self, dt: f32, rig: &mut dyn Rig) -> Option<BlendEvent> {
        let mut event = None;
        if self.current.is_some() {
            if self.incoming.is_some() {
                self.blend_weight -= dt / self.blend_time;
                if self.blend_weight <= 0.0 {
                    self.blend_weight = 0.0;
                    self.current = self.incoming.take();
                    self.outgoing_targets.clear();
                    event = Some(BlendEvent::Swapped);
                } else {
                    self.apply_blended(rig);
                }
            }
            if self.incoming.is_none() {
                if let Some(solo) = self.apply_solo(rig) {
                    event = Some(solo);
                }
            }
        }
        self.tick_ik(dt, rig);
        event
    }

    fn apply_blended(&mut self, rig: &mut dyn Rig) {
        let (Some(current), Some(incoming)) = (self.current.as_mut(), self.incoming.as_mut())
        else {
            return;
        };
        for (track, target) in current.clip.targets.iter().zip(&self.outgoing_targets) {
            let incoming_pose = incoming
                .clip
                .targets
                .iter()
                .find(|other| other.bone == track.bone)
                .map_or(Pose::EMPTY, |other| Pose::sample(other, incoming.frame));
            let pose = blend_pose(
                &Pose::sample(track, current.frame),
                &incoming_pose,
                self.blend_weight,
            );
            pose.apply(rig, *target);
        }
        for (track, target) in incoming.clip.targets.iter().zip(&self.targets) {
            if current.clip.targets.iter().any(|other| other.bone == track.bone) {
                continue;
            }
            Pose::sample(track, incoming.frame).apply(rig, *target);
        }
        current.advance();
        incoming.advance();
    }

    fn apply_solo(&mut self, rig: &mut dyn Rig) -> Option<BlendEvent> {
        let current = self.current.as_mut()?;
        for (index, target) in self.targets.iter().enumerate() {
            if let Some(track) = current.clip.targets.get(index) {
                Pose::sample(track, current.frame).apply(rig, *target);
            }
        }
        if !current.at_end() {
            current.advance();
            return None;
        }
        if current.clip.looped {
            let clip = current.clip.clone();
            self.incoming = Some(ClipCursor::new(clip));
            self.outgoing_targets = self.targets.clone();
            self.blend_weight = 1.0;
            Some(BlendEvent::Looped)
        } else {
            self.current = None;
            self.ik_fade = 1.0;
            self.ik_fading_in = false;
            Some(BlendEvent::Finished)
        }
    }

    fn tick_ik(&mut self, dt: f32, rig: &mut dyn Rig) {
        if self.ik_fade <= 0.0 {
            return;
        }
        self.ik_fade = (self.ik_fade - dt / self.blend_time).max(0.0);
        self.ik_weight = if self.ik_fading_in {
            1.0 - self.ik_fade
        } else {
            self.ik_fade
        };
        rig.set_ik_weight(self.ik_weight);
    }
}
