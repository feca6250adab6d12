//! Core types for the Rapport engine
//!
//! This module defines the data structures that flow through each stage of the
//! signal path: raw keypoints, per-frame feature records, timeline snapshots,
//! aggregate scores, and the exported session record.
//!
//! All records serialize with camelCase field names so the exported session
//! record matches the shape consumed by the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Raw detector output
// ============================================================================

/// A single normalized landmark as produced by the keypoint detector.
///
/// `x` and `y` are image-relative in [0, 1] with `y` growing downwards;
/// `z` is relative depth (smaller is closer to the camera).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }
}

/// Keypoint sets for one frame. Any subset may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeypointFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<Vec<Landmark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<Vec<Landmark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_hand: Option<Vec<Landmark>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_hand: Option<Vec<Landmark>>,
}

/// A detector result replayed from a recording (one NDJSON line)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedFrame {
    /// Capture time; absent means "now"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub keypoints: KeypointFrame,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expressions: Option<ExpressionData>,
}

/// Emotion channels reported by the expression classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Emotion {
    /// All channels in classifier order
    pub const ALL: [Emotion; 7] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
        }
    }
}

/// Expression probabilities for one frame (need not sum to exactly 1)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionData {
    pub neutral: f64,
    pub happy: f64,
    pub sad: f64,
    pub angry: f64,
    pub fearful: f64,
    pub disgusted: f64,
    pub surprised: f64,
}

impl ExpressionData {
    pub fn probability(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Neutral => self.neutral,
            Emotion::Happy => self.happy,
            Emotion::Sad => self.sad,
            Emotion::Angry => self.angry,
            Emotion::Fearful => self.fearful,
            Emotion::Disgusted => self.disgusted,
            Emotion::Surprised => self.surprised,
        }
    }

    /// Arg-max channel. Ties resolve to the earlier channel in [`Emotion::ALL`].
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::Neutral;
        let mut best_value = self.neutral;
        for emotion in Emotion::ALL.iter().skip(1) {
            let value = self.probability(*emotion);
            if value > best_value {
                best = *emotion;
                best_value = value;
            }
        }
        best
    }
}

// ============================================================================
// Per-frame feature records
// ============================================================================

/// Upper-body posture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseData {
    /// Shoulder width relative to frame (0-1)
    pub shoulder_openness: f64,
    /// Forward (+) / backward (-) lean (-1 to 1)
    pub lean_angle: f64,
    /// Shoulder levelness (0-1)
    pub stability: f64,
}

/// Hand movement derived from wrist displacement between consecutive detections
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureData {
    pub left_hand_movement: f64,
    pub right_hand_movement: f64,
    pub gesture_frequency: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadPoseData {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub is_nodding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GazeDirection {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeOpenness {
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GazeData {
    pub looking_at_camera: bool,
    pub gaze_direction: GazeDirection,
    pub eye_openness: EyeOpenness,
}

/// Classification of a single hand from its extended fingers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandShape {
    pub is_open: bool,
    pub is_fist: bool,
    pub is_peace: bool,
    pub is_pointing: bool,
    pub is_thumb_up: bool,
    pub finger_count: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandShapeData {
    pub left: Option<HandShape>,
    pub right: Option<HandShape>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmPosition {
    pub left_arm_raised: f64,
    pub right_arm_raised: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyLean {
    pub lateral: f64,
    pub forward: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyMovementData {
    pub arm_position: ArmPosition,
    pub body_lean: BodyLean,
    pub body_sway: f64,
}

/// Feature records derived from one frame's keypoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameFeatures {
    pub pose: Option<PoseData>,
    pub gesture: Option<GestureData>,
    pub head_pose: Option<HeadPoseData>,
    pub gaze: Option<GazeData>,
    pub hand_shape: Option<HandShapeData>,
    pub body_movement: Option<BodyMovementData>,
}

/// One frame's worth of derived behavioral features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expressions: Option<ExpressionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<PoseData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gesture: Option<GestureData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_pose: Option<HeadPoseData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gaze: Option<GazeData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_shape: Option<HandShapeData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_movement: Option<BodyMovementData>,
}

impl FeatureSnapshot {
    /// Merge normalizer output with the expression classifier's output
    pub fn from_features(
        timestamp: DateTime<Utc>,
        features: FrameFeatures,
        expressions: Option<ExpressionData>,
    ) -> Self {
        Self {
            timestamp,
            expressions,
            pose: features.pose,
            gesture: features.gesture,
            head_pose: features.head_pose,
            gaze: features.gaze,
            hand_shape: features.hand_shape,
            body_movement: features.body_movement,
        }
    }

    /// A snapshot with no detections at all
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self::from_features(timestamp, FrameFeatures::default(), None)
    }
}

// ============================================================================
// Scores
// ============================================================================

/// Detail axis scores derived from the timeline, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationScores {
    pub expressiveness: u8,
    pub gesture_activity: u8,
    pub postural_openness: u8,
    pub eye_contact: u8,
    pub nodding: u8,
}

/// Axis scores produced by transcript analysis (external, best-effort)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAxisScores {
    pub assertiveness: f64,
    pub listening: f64,
    pub nonverbal_reading: f64,
}

impl TextAxisScores {
    /// Neutral defaults substituted when analysis is skipped or fails
    pub const NEUTRAL: TextAxisScores = TextAxisScores {
        assertiveness: 50.0,
        listening: 50.0,
        nonverbal_reading: 50.0,
    };
}

impl Default for TextAxisScores {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Top-level communication axes, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationAxisScores {
    pub assertiveness: u8,
    pub listening: u8,
    pub nonverbal_expression: u8,
    pub nonverbal_reading: u8,
}

// ============================================================================
// Session output
// ============================================================================

/// Aggregate description of a session's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub dominant_emotion: Emotion,
    /// Percentage of expression frames dominated by each emotion
    pub emotion_distribution: BTreeMap<Emotion, u8>,
    pub average_gesture_frequency: f64,
    pub posture_stability: f64,
}

/// Exportable session snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub timeline: Vec<FeatureSnapshot>,
    pub scores: CommunicationScores,
    pub summary: SessionSummary,
}
