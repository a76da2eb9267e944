//! Per-character runtime: clip playback, voice, interruptions and the
//! personal-space reaction.

use fusebox_content::{
    BoundClip, CharacterDef, ClipStore, ConfigurationError, InterruptableKind,
};
use glam::{Quat, Vec3};

use crate::blend::{BlendEvent, BlendPlayer};
use crate::config::ActorTuning;
use crate::face::MouthTracker;
use crate::services::{ActorModel, TickContext};

/// Restored audio never seeks closer than this to the end of the clip.
const RESTORE_END_MARGIN: f32 = 0.01;

/// Single stash slot for the clip an interruption replaced.
#[derive(Debug, Clone)]
struct RestoreInfo {
    clip: BoundClip,
    sentence_time: f32,
    sentence_frame: usize,
}

#[derive(Debug, Clone)]
struct PersonalSpace {
    clip: BoundClip,
    start_time: f32,
    min_time: f32,
    requested: bool,
    breached: bool,
    timer: f32,
}

impl PersonalSpace {
    fn bind(def: &CharacterDef, store: &ClipStore) -> Result<Option<Self>, ConfigurationError> {
        let Some(interruptable) = def.interruptable(InterruptableKind::PersonalSpaceBreach) else {
            return Ok(None);
        };
        let first = interruptable.clips.first().ok_or_else(|| {
            ConfigurationError::MissingInterruptable {
                character: def.name.clone(),
                name: interruptable.name.clone(),
                clip: 0,
            }
        })?;
        Ok(Some(PersonalSpace {
            clip: store.bind(Some(&first.acting_clip), first.audio_clip.as_deref())?,
            start_time: interruptable.start_time,
            min_time: first.min_time,
            requested: false,
            breached: false,
            timer: interruptable.start_time,
        }))
    }
}

#[derive(Debug)]
pub struct Actor {
    def: CharacterDef,
    model: ActorModel,
    tuning: ActorTuning,
    fixed_delta: f32,
    player: BlendPlayer,
    mouth: MouthTracker,
    current: BoundClip,
    restore: Option<RestoreInfo>,
    interruption_timer: f32,
    personal_space: Option<PersonalSpace>,
    mouth_shut_timer: f32,
    sentence_time: f32,
    sentence_frame: usize,
    position: Vec3,
    rotation: Quat,
}

impl Actor {
    pub fn new(
        def: &CharacterDef,
        model: ActorModel,
        store: &ClipStore,
        tuning: &ActorTuning,
        fixed_delta: f32,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            def: def.clone(),
            model,
            tuning: tuning.clone(),
            fixed_delta,
            player: BlendPlayer::new(tuning.blend_acting_time),
            mouth: MouthTracker::new(tuning.volume_mult, tuning.mouth_speed),
            current: BoundClip::default(),
            restore: None,
            interruption_timer: 0.0,
            personal_space: PersonalSpace::bind(def, store)?,
            mouth_shut_timer: 0.0,
            sentence_time: 0.0,
            sentence_frame: 0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        })
    }

    /// Rebinds a parked actor to a new character definition.
    pub fn setup(&mut self, def: &CharacterDef, store: &ClipStore) -> Result<(), ConfigurationError> {
        self.personal_space = PersonalSpace::bind(def, store)?;
        self.def = def.clone();
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn def(&self) -> &CharacterDef {
        &self.def
    }

    pub fn model_name(&self) -> Option<&str> {
        self.def.model.as_deref()
    }

    pub fn player(&self) -> &BlendPlayer {
        &self.player
    }

    pub fn mouth(&self) -> &MouthTracker {
        &self.mouth
    }

    pub fn current_clip(&self) -> &BoundClip {
        &self.current
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn audio_elapsed(&self) -> f32 {
        self.model.audio.elapsed()
    }

    pub fn is_audio_playing(&self) -> bool {
        self.model.audio.is_playing()
    }

    pub fn interruption_timer(&self) -> f32 {
        self.interruption_timer
    }

    pub fn has_restorable_clip(&self) -> bool {
        self.restore.is_some()
    }

    pub fn is_personal_space_breached(&self) -> bool {
        self.personal_space
            .as_ref()
            .is_some_and(|space| space.breached)
    }

    pub fn last_sentence(&self) -> (f32, usize) {
        (self.sentence_time, self.sentence_frame)
    }

    /// True once the mouth has stayed shut for `is_quiet_time`.
    pub fn is_quiet(&self) -> bool {
        self.mouth_shut_timer >= self.tuning.is_quiet_time
    }

    /// Plays `clip`, crossfading from whatever is on. Audio restarts with the
    /// bound clip, or falls silent when there is none.
    pub fn play(&mut self, clip: BoundClip, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        if let Some(acting) = clip.acting.as_ref() {
            self.player
                .play(acting.clone(), self.model.rig.as_mut(), &self.def.name)?;
        }
        self.sentence_frame = 0;
        self.sentence_time = 0.0;

        self.model.audio.stop();
        match clip.audio.as_ref() {
            Some(audio) => {
                self.model.audio.play(audio);
                self.mouth.play(Some(audio.clone()));
            }
            None => self.mouth.stop(),
        }
        ctx.log(format!("actor.{}.play {}", self.def.name, clip.label()));
        self.current = clip;
        Ok(())
    }

    /// Plays an interruption unless one is already running. Returns whether
    /// the request was accepted.
    pub fn play_interruption(
        &mut self,
        clip: BoundClip,
        ctx: &mut TickContext<'_>,
    ) -> Result<bool, ConfigurationError> {
        if self.interruption_timer > 0.0 {
            ctx.log(format!(
                "actor.{}.interrupt_refused {}",
                self.def.name,
                clip.label()
            ));
            return Ok(false);
        }
        let hold = match (clip.audio.as_ref(), clip.acting.as_ref()) {
            (Some(audio), _) => audio.length,
            (None, Some(acting)) => acting.duration(self.fixed_delta),
            (None, None) => 0.0,
        };
        ctx.log(format!("actor.{}.interrupt {}", self.def.name, clip.label()));
        self.store_current();
        self.play(clip, ctx)?;
        self.interruption_timer = hold + self.tuning.back_from_interruption_time;
        Ok(true)
    }

    pub fn set_personal_space_breached(&mut self, breached: bool) {
        if let Some(space) = self.personal_space.as_mut() {
            space.requested = breached;
        }
    }

    /// Silences the actor. The pose stays where it is.
    pub fn stop(&mut self) {
        self.model.audio.stop();
        self.mouth.stop();
    }

    pub fn fixed_tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        let dt = self.fixed_delta;
        self.mouth.tick(dt, self.model.audio.is_playing());

        let playing = self.player.active_clip().map(|clip| clip.name.clone());
        if let Some(BlendEvent::Finished) = self.player.tick(dt, self.model.rig.as_mut()) {
            if let Some(name) = playing {
                ctx.log(format!("actor.{}.clip_end {}", self.def.name, name));
            }
        }

        self.update_personal_space(ctx)?;
        self.update_interruption(ctx)?;
        self.update_mouth();
        Ok(())
    }

    /// Turns to face the player on the horizontal plane.
    pub fn face_player(&mut self, player: Vec3) {
        let to_player = Vec3::new(player.x - self.position.x, 0.0, player.z - self.position.z);
        if to_player.length_squared() > f32::EPSILON {
            self.rotation = Quat::from_rotation_y(to_player.x.atan2(to_player.z));
        }
    }

    pub fn looks_at_player(&self) -> bool {
        self.tuning.look_at_player
    }

    fn store_current(&mut self) {
        let playing = self.player.is_playing() || self.model.audio.is_playing();
        if playing && !self.current.is_empty() {
            self.restore = Some(RestoreInfo {
                clip: self.current.clone(),
                sentence_time: self.sentence_time,
                sentence_frame: self.sentence_frame,
            });
        }
    }

    fn restore_clip(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        let Some(info) = self.restore.take() else {
            return Ok(());
        };
        ctx.log(format!("actor.{}.restore {}", self.def.name, info.clip.label()));
        let length = info.clip.audio.as_ref().map(|audio| audio.length);
        self.play(info.clip, ctx)?;
        if let Some(length) = length {
            let time = info
                .sentence_time
                .min(length - RESTORE_END_MARGIN)
                .max(0.0);
            self.model.audio.seek(time);
        }
        self.player.seek_frame(info.sentence_frame);
        Ok(())
    }

    fn update_personal_space(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        if self.player.is_blending() {
            return Ok(());
        }
        let dt = self.fixed_delta;
        let Some(space) = self.personal_space.as_mut() else {
            return Ok(());
        };

        if space.requested == space.breached {
            return Ok(());
        }
        if space.timer > 0.0 {
            space.timer = (space.timer - dt).max(0.0);
            return Ok(());
        }

        if space.requested {
            space.breached = true;
            space.timer = space.min_time;
            let clip = space.clip.clone();
            ctx.log(format!("actor.{}.breach", self.def.name));
            self.store_current();
            self.play(clip, ctx)
        } else {
            space.breached = false;
            space.timer = space.start_time;
            ctx.log(format!("actor.{}.breach_clear", self.def.name));
            self.restore_clip(ctx)
        }
    }

    fn update_interruption(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ConfigurationError> {
        if self.interruption_timer <= 0.0 {
            return Ok(());
        }
        self.interruption_timer = (self.interruption_timer - self.fixed_delta).max(0.0);
        if self.interruption_timer > 0.0 {
            return Ok(());
        }
        self.restore_clip(ctx)
    }

    fn update_mouth(&mut self) {
        if self.mouth.speech_volume() <= self.tuning.mouth_shut_threshold {
            self.mouth_shut_timer += self.fixed_delta;
        } else {
            self.mouth_shut_timer = 0.0;
        }

        let pause = self.tuning.sentence_pause_time;
        if self.mouth_shut_timer >= pause {
            self.sentence_time = (self.model.audio.elapsed() - pause).max(0.0);
            let pause_frames = (pause / self.fixed_delta).floor() as usize;
            self.sentence_frame = self.player.current_frame().saturating_sub(pause_frames);
            self.mouth_shut_timer = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use fusebox_content::{
        ActingClip, AudioClipDef, Interruptable, InterruptableClip, TargetTrack,
    };

    use super::*;
    use crate::events::EventLog;
    use crate::headless::{HeadlessStage, StageLayout};
    use crate::services::{ActorSource, Stage};

    const DT: f32 = 0.02;

    fn clip(name: &str, frames: usize, looped: bool) -> ActingClip {
        ActingClip {
            name: name.to_string(),
            frame_count: frames,
            looped,
            override_time: 0.0,
            targets: vec![TargetTrack {
                name: "root".to_string(),
                bone: "Root".to_string(),
                apply_position: true,
                apply_rotation: false,
                positions: (0..frames)
                    .map(|frame| Vec3::new(frame as f32, 0.0, 0.0))
                    .collect(),
                rotations: Vec::new(),
                left_trigger: Vec::new(),
                right_trigger: Vec::new(),
            }],
        }
    }

    fn audio(name: &str, length: f32, loud: bool) -> AudioClipDef {
        AudioClipDef {
            name: name.to_string(),
            length,
            fixed_update_rate: 1,
            volume: vec![if loud { 0.5 } else { 0.0 }; 16],
        }
    }

    fn store() -> ClipStore {
        ClipStore::new(
            vec![
                clip("talk", 200, true),
                clip("flinch", 30, false),
                clip("shoo", 40, true),
            ],
            vec![
                audio("speech", 3.0, true),
                audio("ouch", 0.4, true),
                audio("hush", 2.0, false),
            ],
        )
        .expect("store")
    }

    fn character(with_personal_space: bool) -> CharacterDef {
        let interruptables = if with_personal_space {
            vec![Interruptable {
                name: "TooClose".to_string(),
                kind: InterruptableKind::PersonalSpaceBreach,
                start_time: 0.1,
                clips: vec![InterruptableClip {
                    min_time: 0.2,
                    audio_clip: None,
                    acting_clip: "shoo".to_string(),
                }],
            }]
        } else {
            Vec::new()
        };
        CharacterDef {
            name: "sam".to_string(),
            model: Some("sam_model".to_string()),
            enter: Default::default(),
            exit: Default::default(),
            use_existing_character: false,
            name_in_scene: None,
            rotate_on_exit: true,
            task_lists: Vec::new(),
            interruptables,
        }
    }

    fn stage() -> HeadlessStage {
        HeadlessStage::new(StageLayout {
            bones: vec!["Root".to_string()],
            scene_actors: vec!["sam".to_string()],
            ..StageLayout::default()
        })
    }

    fn actor(stage: &mut HeadlessStage, store: &ClipStore, personal_space: bool) -> Actor {
        let model = stage
            .instantiate("sam", ActorSource::Scene("sam"))
            .expect("scene actor");
        let tuning = ActorTuning {
            blend_acting_time: 0.1,
            ..ActorTuning::default()
        };
        Actor::new(&character(personal_space), model, store, &tuning, DT).expect("actor")
    }

    fn tick(actor: &mut Actor, stage: &mut HeadlessStage, events: &mut EventLog, ticks: usize) {
        for _ in 0..ticks {
            stage.advance(DT);
            let mut ctx = TickContext::new(&mut *stage, &mut *events);
            actor.fixed_tick(&mut ctx).expect("fixed tick");
        }
    }

    fn play(actor: &mut Actor, stage: &mut HeadlessStage, events: &mut EventLog, clip: BoundClip) {
        let mut ctx = TickContext::new(&mut *stage, &mut *events);
        actor.play(clip, &mut ctx).expect("play");
    }

    #[test]
    fn play_restarts_audio_and_resets_sentence() {
        let store = store();
        let mut stage = stage();
        let mut events = EventLog::new();
        let mut sam = actor(&mut stage, &store, false);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("hush")).expect("bind"));
        tick(&mut sam, &mut stage, &mut events, 60);
        assert!(sam.last_sentence().0 > 0.0);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("speech")).expect("bind"));
        assert_eq!(sam.last_sentence(), (0.0, 0));
        assert_eq!(sam.audio_elapsed(), 0.0);
        assert!(sam.is_audio_playing());
        assert_eq!(stage.voice("sam").and_then(|voice| voice.clip), Some("speech".to_string()));

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), None).expect("bind"));
        assert!(!sam.is_audio_playing());
        assert!(events.contains("actor.sam.play talk <silent>"));
    }

    #[test]
    fn quiet_follows_mouth_envelope() {
        let store = store();
        let mut stage = stage();
        let mut events = EventLog::new();
        let mut sam = actor(&mut stage, &store, false);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("speech")).expect("bind"));
        tick(&mut sam, &mut stage, &mut events, 10);
        assert!(!sam.is_quiet());

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("hush")).expect("bind"));
        tick(&mut sam, &mut stage, &mut events, 6);
        assert!(sam.is_quiet());
    }

    #[test]
    fn sentence_marks_trail_the_pause() {
        let store = store();
        let mut stage = stage();
        let mut events = EventLog::new();
        let mut sam = actor(&mut stage, &store, false);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("hush")).expect("bind"));
        // Roughly 25 ticks of silence reach the 0.5 s pause.
        tick(&mut sam, &mut stage, &mut events, 30);
        let (time, frame) = sam.last_sentence();
        assert!(time < 0.05, "sentence time {time}");
        assert!(frame <= 1, "sentence frame {frame}");

        tick(&mut sam, &mut stage, &mut events, 30);
        let (time, frame) = sam.last_sentence();
        assert!((0.45..0.6).contains(&time), "sentence time {time}");
        assert!((24..=28).contains(&frame), "sentence frame {frame}");
    }

    #[test]
    fn interruption_restores_stashed_clip() {
        let store = store();
        let mut stage = stage();
        let mut events = EventLog::new();
        let mut sam = actor(&mut stage, &store, false);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("hush")).expect("bind"));
        tick(&mut sam, &mut stage, &mut events, 60);
        let (stash_time, _) = sam.last_sentence();
        assert!(stash_time > 0.0);

        let ouch = store.bind(Some("flinch"), Some("ouch")).expect("bind");
        {
            let mut ctx = TickContext::new(&mut stage, &mut events);
            assert!(sam.play_interruption(ouch, &mut ctx).expect("interrupt"));
        }
        assert!((sam.interruption_timer() - 1.4).abs() < 1e-5);
        assert_eq!(sam.current_clip().label(), "flinch ouch");

        tick(&mut sam, &mut stage, &mut events, 75);
        assert!(events.contains("actor.sam.restore talk hush"));
        assert_eq!(sam.current_clip().label(), "talk hush");
        assert!(!sam.has_restorable_clip());
        let restored = stage.voice("sam").expect("voice");
        assert_eq!(restored.clip.as_deref(), Some("hush"));
        assert!(restored.elapsed >= stash_time);
        assert!(restored.elapsed <= stash_time + DT * 6.0);
    }

    #[test]
    fn second_interruption_is_refused_while_first_runs() {
        let store = store();
        let mut stage = stage();
        let mut events = EventLog::new();
        let mut sam = actor(&mut stage, &store, false);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("speech")).expect("bind"));
        tick(&mut sam, &mut stage, &mut events, 5);
        let ouch = store.bind(Some("flinch"), Some("ouch")).expect("bind");
        let mut ctx = TickContext::new(&mut stage, &mut events);
        assert!(sam.play_interruption(ouch.clone(), &mut ctx).expect("first"));
        assert!(!sam.play_interruption(ouch, &mut ctx).expect("second"));
        drop(ctx);

        assert_eq!(events.count("actor.sam.interrupt_refused flinch ouch"), 1);
        tick(&mut sam, &mut stage, &mut events, 80);
        assert_eq!(events.count("actor.sam.restore talk speech"), 1);
        assert_eq!(sam.current_clip().label(), "talk speech");
    }

    #[test]
    fn restore_seek_is_clamped_before_clip_end() {
        let store = store();
        let mut stage = stage();
        let mut events = EventLog::new();
        let mut sam = actor(&mut stage, &store, false);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("hush")).expect("bind"));
        sam.sentence_time = 10.0;
        sam.store_current();
        {
            let mut ctx = TickContext::new(&mut stage, &mut events);
            sam.restore_clip(&mut ctx).expect("restore");
        }
        assert!((sam.audio_elapsed() - (2.0 - RESTORE_END_MARGIN)).abs() < 1e-6);
    }

    #[test]
    fn restore_seeks_acting_clip_to_stashed_frame() {
        let store = store();
        let mut stage = stage();
        let mut events = EventLog::new();
        let mut sam = actor(&mut stage, &store, false);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("hush")).expect("bind"));
        tick(&mut sam, &mut stage, &mut events, 30);
        sam.sentence_frame = 25;
        sam.store_current();
        play(&mut sam, &mut stage, &mut events, store.bind(Some("flinch"), Some("ouch")).expect("bind"));
        tick(&mut sam, &mut stage, &mut events, 10);
        assert_eq!(sam.current_clip().label(), "flinch ouch");

        {
            let mut ctx = TickContext::new(&mut stage, &mut events);
            sam.restore_clip(&mut ctx).expect("restore");
        }
        assert_eq!(sam.player().incoming_frame(), Some(25));
        assert_eq!(sam.player().active_clip().map(|clip| clip.name.as_str()), Some("talk"));

        tick(&mut sam, &mut stage, &mut events, 1);
        assert_eq!(sam.player().incoming_frame(), Some(26));

        sam.sentence_frame = 500;
        sam.store_current();
        {
            let mut ctx = TickContext::new(&mut stage, &mut events);
            sam.restore_clip(&mut ctx).expect("restore");
        }
        assert_eq!(sam.player().incoming_frame(), Some(199));
    }

    #[test]
    fn clearing_unbreached_personal_space_does_nothing() {
        let store = store();
        let mut stage = stage();
        let mut events = EventLog::new();
        let mut sam = actor(&mut stage, &store, true);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("hush")).expect("bind"));
        tick(&mut sam, &mut stage, &mut events, 10);

        sam.set_personal_space_breached(false);
        tick(&mut sam, &mut stage, &mut events, 30);
        assert!(!sam.is_personal_space_breached());
        assert!(!events.contains("actor.sam.breach"));
        assert!(!events.contains("actor.sam.breach_clear"));
        assert!(!events.contains("actor.sam.restore talk hush"));
        assert!(!sam.has_restorable_clip());
        assert_eq!(sam.current_clip().label(), "talk hush");
    }

    #[test]
    fn personal_space_breach_round_trip() {
        let store = store();
        let mut stage = stage();
        let mut events = EventLog::new();
        let mut sam = actor(&mut stage, &store, true);

        play(&mut sam, &mut stage, &mut events, store.bind(Some("talk"), Some("hush")).expect("bind"));
        tick(&mut sam, &mut stage, &mut events, 10);

        sam.set_personal_space_breached(true);
        tick(&mut sam, &mut stage, &mut events, 4);
        assert!(!sam.is_personal_space_breached());
        tick(&mut sam, &mut stage, &mut events, 6);
        assert!(sam.is_personal_space_breached());
        assert_eq!(sam.current_clip().label(), "shoo <silent>");

        sam.set_personal_space_breached(true);
        tick(&mut sam, &mut stage, &mut events, 20);
        assert_eq!(events.count("actor.sam.breach"), 1);

        sam.set_personal_space_breached(false);
        tick(&mut sam, &mut stage, &mut events, 30);
        assert!(!sam.is_personal_space_breached());
        assert_eq!(events.count("actor.sam.breach_clear"), 1);
        assert!(events.contains("actor.sam.restore talk hush"));
        assert_eq!(sam.current_clip().label(), "talk hush");
    }

    #[test]
    fn personal_space_needs_a_clip() {
        let store = store();
        let mut stage = stage();
        let mut def = character(true);
        def.interruptables[0].clips.clear();
        let model = stage
            .instantiate("sam", ActorSource::Scene("sam"))
            .expect("scene actor");
        let err = Actor::new(&def, model, &store, &ActorTuning::default(), DT)
            .expect_err("empty interruptable");
        assert!(matches!(err, ConfigurationError::MissingInterruptable { clip: 0, .. }));
    }

    #[test]
    fn face_player_turns_about_y_only() {
        let store = store();
        let mut stage = stage();
        let mut sam = actor(&mut stage, &store, false);
        sam.face_player(Vec3::new(3.0, 5.0, 0.0));
        let forward = sam.forward();
        assert!((forward - Vec3::X).length() < 1e-5);
    }
}
