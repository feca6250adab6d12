//! Engine configuration
//!
//! Every section carries serde defaults, so a partial JSON document (or an
//! empty one) yields a usable configuration.

use crate::error::RapportError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default capture cadence (frames per second)
pub const DEFAULT_FRAMES_PER_SECOND: u32 = 10;

/// Highest capture cadence with a whole-millisecond frame interval
pub const MAX_FRAMES_PER_SECOND: u32 = 1000;

/// Fewest pitch samples nod detection compares across
pub const MIN_NOD_LAG: usize = 5;

/// Default live window size (timeline entries)
pub const DEFAULT_LIVE_WINDOW: usize = 30;

/// Default quiet period before the silence detector ends a turn
pub const DEFAULT_SILENCE_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RapportConfig {
    pub capture: CaptureConfig,
    pub normalizer: NormalizerConfig,
    pub scoring: ScoringConfig,
    pub conversation: ConversationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub frames_per_second: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_per_second: DEFAULT_FRAMES_PER_SECOND,
        }
    }
}

impl CaptureConfig {
    /// Time between frames, never shorter than one millisecond
    pub fn frame_interval(&self) -> Duration {
        let fps = self.frames_per_second.clamp(1, MAX_FRAMES_PER_SECOND);
        Duration::from_millis(1000 / u64::from(fps))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Pitch samples retained for nod detection
    pub pitch_history: usize,
    /// Compare the latest pitch with the sample this many positions back (inclusive)
    pub nod_lag: usize,
    /// Pitch change above which the head is considered nodding
    pub nod_threshold: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            pitch_history: 10,
            nod_lag: 5,
            nod_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub live_window: usize,
    /// Multiplier applied to the mean frame-to-frame expression variation
    pub expression_variation_scale: f64,
    /// Points per distinct non-neutral dominant emotion
    pub emotion_diversity_bonus: f64,
    /// Multiplier applied to the looking-at-camera frequency
    pub eye_contact_scale: f64,
    /// Multiplier applied to the nodding frequency
    pub nodding_scale: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            live_window: DEFAULT_LIVE_WINDOW,
            expression_variation_scale: 200.0,
            emotion_diversity_bonus: 10.0,
            eye_contact_scale: 100.0,
            nodding_scale: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub silence_timeout_ms: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            silence_timeout_ms: DEFAULT_SILENCE_TIMEOUT_MS,
        }
    }
}

impl ConversationConfig {
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }
}

impl RapportConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, RapportError> {
        let config: RapportConfig = serde_json::from_str(json)
            .map_err(|e| RapportError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self, RapportError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            RapportError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, RapportError> {
        serde_json::to_string_pretty(self).map_err(RapportError::JsonError)
    }

    pub fn validate(&self) -> Result<(), RapportError> {
        if self.capture.frames_per_second == 0
            || self.capture.frames_per_second > MAX_FRAMES_PER_SECOND
        {
            return Err(RapportError::Config(format!(
                "capture.frames_per_second must be within 1..={}",
                MAX_FRAMES_PER_SECOND
            )));
        }
        if self.scoring.live_window == 0 {
            return Err(RapportError::Config(
                "scoring.live_window must be greater than zero".to_string(),
            ));
        }
        if self.normalizer.nod_lag < MIN_NOD_LAG
            || self.normalizer.nod_lag > self.normalizer.pitch_history
        {
            return Err(RapportError::Config(format!(
                "normalizer.nod_lag must be within {}..={}",
                MIN_NOD_LAG, self.normalizer.pitch_history
            )));
        }
        if self.normalizer.nod_threshold <= 0.0 {
            return Err(RapportError::Config(
                "normalizer.nod_threshold must be positive".to_string(),
            ));
        }
        let scales = [
            ("expression_variation_scale", self.scoring.expression_variation_scale),
            ("emotion_diversity_bonus", self.scoring.emotion_diversity_bonus),
            ("eye_contact_scale", self.scoring.eye_contact_scale),
            ("nodding_scale", self.scoring.nodding_scale),
        ];
        for (name, value) in scales {
            if !(value > 0.0) {
                return Err(RapportError::Config(format!(
                    "scoring.{} must be positive",
                    name
                )));
            }
        }
        if self.conversation.silence_timeout_ms == 0 {
            return Err(RapportError::Config(
                "conversation.silence_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = RapportConfig::from_json("{}").unwrap();
        assert_eq!(config, RapportConfig::default());
        assert_eq!(config.scoring.live_window, 30);
        assert_eq!(config.conversation.silence_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn test_partial_override() {
        let config =
            RapportConfig::from_json(r#"{"conversation": {"silence_timeout_ms": 1500}}"#).unwrap();
        assert_eq!(config.conversation.silence_timeout_ms, 1500);
        assert_eq!(config.capture.frames_per_second, 10);
    }

    #[test]
    fn test_frame_interval() {
        let capture = CaptureConfig::default();
        assert_eq!(capture.frame_interval(), Duration::from_millis(100));

        let fastest = CaptureConfig {
            frames_per_second: MAX_FRAMES_PER_SECOND,
        };
        assert_eq!(fastest.frame_interval(), Duration::from_millis(1));

        // Unvalidated rates still yield a usable interval
        let too_fast = CaptureConfig {
            frames_per_second: 2000,
        };
        assert_eq!(too_fast.frame_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(RapportConfig::from_json(r#"{"capture": {"frames_per_second": 0}}"#).is_err());
        assert!(RapportConfig::from_json(r#"{"capture": {"frames_per_second": 2000}}"#).is_err());
        assert!(RapportConfig::from_json(r#"{"capture": {"frames_per_second": 1000}}"#).is_ok());
        assert!(RapportConfig::from_json(r#"{"normalizer": {"nod_lag": 12}}"#).is_err());
        assert!(RapportConfig::from_json(r#"{"normalizer": {"nod_lag": 4}}"#).is_err());
        assert!(RapportConfig::from_json(r#"{"normalizer": {"nod_lag": 5}}"#).is_ok());
        assert!(RapportConfig::from_json(r#"{"scoring": {"nodding_scale": -1.0}}"#).is_err());
        assert!(RapportConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_round_trip_through_json() {
        let json = RapportConfig::default().to_json().unwrap();
        assert_eq!(RapportConfig::from_json(&json).unwrap(), RapportConfig::default());
    }
}
