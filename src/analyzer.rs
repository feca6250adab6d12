//! Frame analyzer
//!
//! Owns the per-session signal path: keypoint normalizer, timeline, and
//! scoring engine. Each processed frame appends one snapshot and publishes
//! the live detail scores on a watch channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::trace;

use crate::config::RapportConfig;
use crate::error::RapportError;
use crate::normalizer::KeypointNormalizer;
use crate::scoring::ScoreEngine;
use crate::timeline::Timeline;
use crate::types::{
    CommunicationScores, ExpressionData, FeatureSnapshot, KeypointFrame, SessionSummary,
};

/// Analyzer shared between the capture loop and the session
pub type SharedAnalyzer = Arc<Mutex<FrameAnalyzer>>;

pub struct FrameAnalyzer {
    normalizer: KeypointNormalizer,
    timeline: Timeline,
    engine: ScoreEngine,
    live_tx: watch::Sender<CommunicationScores>,
}

impl Default for FrameAnalyzer {
    fn default() -> Self {
        Self::new(&RapportConfig::default())
    }
}

impl FrameAnalyzer {
    pub fn new(config: &RapportConfig) -> Self {
        let (live_tx, _rx) = watch::channel(CommunicationScores::default());
        Self {
            normalizer: KeypointNormalizer::with_config(config.normalizer.clone()),
            timeline: Timeline::new(),
            engine: ScoreEngine::with_config(config.scoring.clone()),
            live_tx,
        }
    }

    pub fn shared(self) -> SharedAnalyzer {
        Arc::new(Mutex::new(self))
    }

    /// Clear the timeline and all rolling normalizer state
    pub fn reset(&mut self) {
        self.normalizer.reset();
        self.timeline.clear();
        self.live_tx.send_replace(CommunicationScores::default());
    }

    /// Normalize one frame, append it, and return the live scores.
    ///
    /// A frame older than the newest snapshot is rejected before any rolling
    /// state is touched.
    pub fn process_frame(
        &mut self,
        timestamp: DateTime<Utc>,
        keypoints: &KeypointFrame,
        expressions: Option<ExpressionData>,
    ) -> Result<CommunicationScores, RapportError> {
        if let Some(last) = self.timeline.last_timestamp() {
            if timestamp < last {
                return Err(RapportError::OutOfOrderSnapshot(format!(
                    "frame at {} precedes last entry at {}",
                    timestamp.to_rfc3339(),
                    last.to_rfc3339()
                )));
            }
        }

        let features = self.normalizer.normalize(keypoints);
        self.push_snapshot(FeatureSnapshot::from_features(timestamp, features, expressions))
    }

    /// Append an already-built snapshot and return the live scores
    pub fn push_snapshot(
        &mut self,
        snapshot: FeatureSnapshot,
    ) -> Result<CommunicationScores, RapportError> {
        self.timeline.append(snapshot)?;
        let scores = self.engine.score_live(&self.timeline);
        trace!(entries = self.timeline.len(), ?scores, "live scores updated");
        self.live_tx.send_replace(scores);
        Ok(scores)
    }

    /// Receiver that always holds the latest live scores
    pub fn subscribe_scores(&self) -> watch::Receiver<CommunicationScores> {
        self.live_tx.subscribe()
    }

    pub fn live_scores(&self) -> CommunicationScores {
        *self.live_tx.borrow()
    }

    pub fn final_scores(&self) -> CommunicationScores {
        self.engine.score_final(&self.timeline)
    }

    pub fn summary(&self) -> SessionSummary {
        self.engine.summarize(self.timeline.entries())
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn engine(&self) -> &ScoreEngine {
        &self.engine
    }
}

/// Lock a shared analyzer, recovering from a poisoned lock
pub fn lock_analyzer(analyzer: &SharedAnalyzer) -> MutexGuard<'_, FrameAnalyzer> {
    analyzer.lock().unwrap_or_else(PoisonError::into_inner)
}
