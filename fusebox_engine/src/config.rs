use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Per-actor playback and speech-detection tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorTuning {
    /// Seconds a crossfade between two acting clips (or to/from idle) takes.
    pub blend_acting_time: f32,
    pub mouth_shut_threshold: f32,
    /// Mouth-shut time that marks the end of a sentence.
    pub sentence_pause_time: f32,
    pub back_from_interruption_time: f32,
    pub is_quiet_time: f32,
    pub volume_mult: f32,
    pub mouth_speed: f32,
    pub look_at_player: bool,
}

impl Default for ActorTuning {
    fn default() -> Self {
        Self {
            blend_acting_time: 0.5,
            mouth_shut_threshold: 0.1,
            sentence_pause_time: 0.5,
            back_from_interruption_time: 1.0,
            is_quiet_time: 0.1,
            volume_mult: 10.0,
            mouth_speed: 5.0,
            look_at_player: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorTuning {
    pub walk_speed: f32,
    /// Radians per second an exiting actor turns toward its travel direction.
    pub rot_speed: f32,
    pub arrive_epsilon: f32,
    /// Spawn anchor per actor slot.
    pub spawn_points: Vec<String>,
    pub interact_point: String,
    pub walking_clip: Option<String>,
}

impl Default for OrchestratorTuning {
    fn default() -> Self {
        Self {
            walk_speed: 2.0,
            rot_speed: 20.0,
            arrive_epsilon: 0.01,
            spawn_points: Vec::new(),
            interact_point: "interact".to_string(),
            walking_clip: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionTuning {
    pub start_delay: f32,
}

impl Default for MissionTuning {
    fn default() -> Self {
        Self { start_delay: 3.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub fixed_delta: f32,
    pub frame_delta: f32,
    pub actor: ActorTuning,
    pub orchestrator: OrchestratorTuning,
    pub mission: MissionTuning,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fixed_delta: 0.02,
            frame_delta: 1.0 / 60.0,
            actor: ActorTuning::default(),
            orchestrator: OrchestratorTuning::default(),
            mission: MissionTuning::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_file(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read runtime config: {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| {
                    format!("failed to parse runtime config: {}", path.display())
                })?
            }
            None => RuntimeConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.fixed_delta > 0.0,
            "fixed_delta must be positive (got {})",
            self.fixed_delta
        );
        ensure!(
            self.frame_delta > 0.0,
            "frame_delta must be positive (got {})",
            self.frame_delta
        );
        ensure!(
            self.actor.blend_acting_time > 0.0,
            "blend_acting_time must be positive (got {})",
            self.actor.blend_acting_time
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: RuntimeConfig = serde_json::from_str(
            r#"{ "fixed_delta": 0.01, "actor": { "look_at_player": true } }"#,
        )
        .expect("parse config");
        assert_eq!(config.fixed_delta, 0.01);
        assert!(config.actor.look_at_player);
        assert_eq!(config.actor.blend_acting_time, 0.5);
        assert_eq!(config.mission.start_delay, 3.0);
        assert_eq!(config.orchestrator.interact_point, "interact");
    }

    #[test]
    fn missing_path_uses_defaults() {
        let config = RuntimeConfig::from_json_file(None).expect("default config");
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn rejects_non_positive_tick() {
        let config = RuntimeConfig {
            fixed_delta: 0.0,
            ..RuntimeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
