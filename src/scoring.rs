//! Scoring engine
//!
//! Aggregates a slice of feature snapshots into the five detail axis scores,
//! summarizes a session, and combines detail scores with text-derived axis
//! scores into the final four-axis classification.
//!
//! Live and final reads use identical formulas; only the input slice differs
//! (the most recent `live_window` entries vs. the whole timeline).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::RapportError;
use crate::timeline::Timeline;
use crate::types::{
    CommunicationAxisScores, CommunicationScores, Emotion, ExpressionData, FeatureSnapshot,
    SessionSummary, TextAxisScores,
};

/// Blend weights for `nonverbalExpression`
const WEIGHT_EXPRESSIVENESS: f64 = 0.25;
const WEIGHT_GESTURE_ACTIVITY: f64 = 0.25;
const WEIGHT_POSTURAL_OPENNESS: f64 = 0.20;
const WEIGHT_EYE_CONTACT: f64 = 0.20;
const WEIGHT_NODDING: f64 = 0.10;

/// Axis scores at or above this value select the "high" letter
pub const AXIS_HIGH_THRESHOLD: u8 = 50;

#[derive(Debug, Clone, Default)]
pub struct ScoreEngine {
    config: ScoringConfig,
}

impl ScoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn live_window(&self) -> usize {
        self.config.live_window
    }

    /// Scores over the most recent `live_window` entries
    pub fn score_live(&self, timeline: &Timeline) -> CommunicationScores {
        self.score(timeline.window(self.config.live_window))
    }

    /// Scores over the whole timeline
    pub fn score_final(&self, timeline: &Timeline) -> CommunicationScores {
        self.score(timeline.entries())
    }

    /// Detail axis scores for an arbitrary slice. An empty slice scores zero everywhere.
    pub fn score(&self, snapshots: &[FeatureSnapshot]) -> CommunicationScores {
        CommunicationScores {
            expressiveness: to_score(self.expressiveness(snapshots)),
            gesture_activity: to_score(self.gesture_activity(snapshots)),
            postural_openness: to_score(self.postural_openness(snapshots)),
            eye_contact: to_score(self.eye_contact(snapshots)),
            nodding: to_score(self.nodding(snapshots)),
        }
    }

    /// Frame-to-frame change in the happy/sad/angry/surprised channels plus a
    /// bonus per distinct non-neutral dominant emotion.
    fn expressiveness(&self, snapshots: &[FeatureSnapshot]) -> f64 {
        let expressions: Vec<&ExpressionData> =
            snapshots.iter().filter_map(|s| s.expressions.as_ref()).collect();
        if expressions.is_empty() {
            return 0.0;
        }

        let total_variation: f64 = expressions
            .windows(2)
            .map(|pair| expression_variation(pair[0], pair[1]))
            .sum();
        let avg_variation = total_variation / expressions.len() as f64;

        let distinct_emotions = expressions
            .iter()
            .map(|e| e.dominant())
            .filter(|emotion| *emotion != Emotion::Neutral)
            .collect::<std::collections::BTreeSet<_>>()
            .len();

        avg_variation * self.config.expression_variation_scale
            + distinct_emotions as f64 * self.config.emotion_diversity_bonus
    }

    fn gesture_activity(&self, snapshots: &[FeatureSnapshot]) -> f64 {
        mean(snapshots.iter().filter_map(|s| s.gesture.map(|g| g.gesture_frequency)))
            .map_or(0.0, |avg| avg * 100.0)
    }

    fn postural_openness(&self, snapshots: &[FeatureSnapshot]) -> f64 {
        let poses: Vec<_> = snapshots.iter().filter_map(|s| s.pose).collect();
        if poses.is_empty() {
            return 0.0;
        }

        let count = poses.len() as f64;
        let avg_openness = poses.iter().map(|p| p.shoulder_openness).sum::<f64>() / count;
        let avg_stability = poses.iter().map(|p| p.stability).sum::<f64>() / count;
        let avg_lean = poses.iter().map(|p| p.lean_angle).sum::<f64>() / count;
        let lean_bonus = if avg_lean > 0.0 { avg_lean * 20.0 } else { 0.0 };

        avg_openness * 50.0 + avg_stability * 30.0 + lean_bonus
    }

    fn eye_contact(&self, snapshots: &[FeatureSnapshot]) -> f64 {
        frequency(snapshots.iter().filter_map(|s| s.gaze.map(|g| g.looking_at_camera)))
            .map_or(0.0, |f| f * self.config.eye_contact_scale)
    }

    fn nodding(&self, snapshots: &[FeatureSnapshot]) -> f64 {
        frequency(snapshots.iter().filter_map(|s| s.head_pose.map(|h| h.is_nodding)))
            .map_or(0.0, |f| f * self.config.nodding_scale)
    }

    /// Emotion distribution, posture stability, and gesture frequency for a slice
    pub fn summarize(&self, snapshots: &[FeatureSnapshot]) -> SessionSummary {
        let mut counts: BTreeMap<Emotion, usize> =
            Emotion::ALL.iter().map(|e| (*e, 0)).collect();
        let mut expression_frames = 0usize;
        for expressions in snapshots.iter().filter_map(|s| s.expressions.as_ref()) {
            *counts.entry(expressions.dominant()).or_insert(0) += 1;
            expression_frames += 1;
        }

        let total = expression_frames.max(1) as f64;
        let emotion_distribution = counts
            .iter()
            .map(|(emotion, count)| (*emotion, to_score(*count as f64 / total * 100.0)))
            .collect();

        // Highest count wins; ties go to the earlier channel
        let mut dominant_emotion = Emotion::Neutral;
        let mut best = 0usize;
        for emotion in Emotion::ALL {
            let count = counts.get(&emotion).copied().unwrap_or(0);
            if count > best {
                best = count;
                dominant_emotion = emotion;
            }
        }

        SessionSummary {
            dominant_emotion,
            emotion_distribution,
            average_gesture_frequency: mean(
                snapshots.iter().filter_map(|s| s.gesture.map(|g| g.gesture_frequency)),
            )
            .unwrap_or(0.0),
            posture_stability: mean(snapshots.iter().filter_map(|s| s.pose.map(|p| p.stability)))
                .unwrap_or(0.0),
        }
    }
}

/// Weighted blend of the detail axes
pub fn nonverbal_expression(scores: &CommunicationScores) -> u8 {
    let blended = f64::from(scores.expressiveness) * WEIGHT_EXPRESSIVENESS
        + f64::from(scores.gesture_activity) * WEIGHT_GESTURE_ACTIVITY
        + f64::from(scores.postural_openness) * WEIGHT_POSTURAL_OPENNESS
        + f64::from(scores.eye_contact) * WEIGHT_EYE_CONTACT
        + f64::from(scores.nodding) * WEIGHT_NODDING;
    to_score(blended)
}

/// Combine text-derived axes with the video-derived `nonverbalExpression`
pub fn combine_axes(scores: &CommunicationScores, text: TextAxisScores) -> CommunicationAxisScores {
    CommunicationAxisScores {
        assertiveness: to_score(text.assertiveness),
        listening: to_score(text.listening),
        nonverbal_expression: nonverbal_expression(scores),
        nonverbal_reading: to_score(text.nonverbal_reading),
    }
}

/// Four-letter communication type, one letter per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CommunicationType {
    pub assertive: bool,
    pub connecting: bool,
    pub faceful: bool,
    pub perceptive: bool,
}

impl CommunicationType {
    pub fn from_axes(axes: &CommunicationAxisScores) -> Self {
        Self {
            assertive: axes.assertiveness >= AXIS_HIGH_THRESHOLD,
            connecting: axes.listening >= AXIS_HIGH_THRESHOLD,
            faceful: axes.nonverbal_expression >= AXIS_HIGH_THRESHOLD,
            perceptive: axes.nonverbal_reading >= AXIS_HIGH_THRESHOLD,
        }
    }

    pub fn code(&self) -> String {
        [
            if self.assertive { 'A' } else { 'R' },
            if self.connecting { 'C' } else { 'D' },
            if self.faceful { 'F' } else { 'S' },
            if self.perceptive { 'P' } else { 'T' },
        ]
        .iter()
        .collect()
    }

    pub fn labels(&self) -> [&'static str; 4] {
        [
            if self.assertive { "Assert" } else { "Reserved" },
            if self.connecting { "Connect" } else { "Distill" },
            if self.faceful { "Faceful" } else { "Subtle" },
            if self.perceptive { "Perceptive" } else { "Tell-me" },
        ]
    }

    pub fn parse(code: &str) -> Result<Self, RapportError> {
        let letters: Vec<char> = code.trim().chars().map(|c| c.to_ascii_uppercase()).collect();
        let pick = |letter: Option<&char>, high: char, low: char| match letter {
            Some(c) if *c == high => Ok(true),
            Some(c) if *c == low => Ok(false),
            _ => Err(RapportError::ParseError(format!(
                "invalid communication type code: {}",
                code
            ))),
        };
        if letters.len() != 4 {
            return Err(RapportError::ParseError(format!(
                "communication type code must have 4 letters: {}",
                code
            )));
        }
        Ok(Self {
            assertive: pick(letters.first(), 'A', 'R')?,
            connecting: pick(letters.get(1), 'C', 'D')?,
            faceful: pick(letters.get(2), 'F', 'S')?,
            perceptive: pick(letters.get(3), 'P', 'T')?,
        })
    }
}

impl fmt::Display for CommunicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl From<CommunicationType> for String {
    fn from(value: CommunicationType) -> Self {
        value.code()
    }
}

impl TryFrom<String> for CommunicationType {
    type Error = RapportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Result computed once at session end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    pub scores: CommunicationScores,
    pub axis_scores: CommunicationAxisScores,
    pub communication_type: CommunicationType,
}

impl FinalResult {
    pub fn new(scores: CommunicationScores, text: TextAxisScores) -> Self {
        let axis_scores = combine_axes(&scores, text);
        Self {
            scores,
            axis_scores,
            communication_type: CommunicationType::from_axes(&axis_scores),
        }
    }
}

fn expression_variation(prev: &ExpressionData, curr: &ExpressionData) -> f64 {
    (curr.happy - prev.happy).abs()
        + (curr.sad - prev.sad).abs()
        + (curr.angry - prev.angry).abs()
        + (curr.surprised - prev.surprised).abs()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Share of `true` values, `None` when there are no values
fn frequency(values: impl Iterator<Item = bool>) -> Option<f64> {
    mean(values.map(|v| if v { 1.0 } else { 0.0 }))
}

/// Saturate into [0, 100] and round to the nearest integer
fn to_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}
