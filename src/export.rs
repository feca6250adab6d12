//! Session export
//!
//! Packages the timeline, final detail scores, and summary into the
//! exportable session record.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RapportError;
use crate::scoring::ScoreEngine;
use crate::timeline::Timeline;
use crate::types::SessionRecord;

/// Builds [`SessionRecord`]s for one session id
#[derive(Debug, Clone)]
pub struct SessionRecordEncoder {
    session_id: String,
}

impl Default for SessionRecordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRecordEncoder {
    /// Create an encoder with a fresh session id
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Snapshot the session.
    ///
    /// Scores and summary cover the whole timeline. When no explicit bounds
    /// are given they fall back to the first and last snapshot timestamps.
    pub fn encode(
        &self,
        timeline: &Timeline,
        engine: &ScoreEngine,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> SessionRecord {
        let now = Utc::now();
        let start_time = start_time.or(timeline.first_timestamp()).unwrap_or(now);
        let end_time = end_time
            .or(timeline.last_timestamp())
            .unwrap_or(now)
            .max(start_time);
        let duration_seconds = (end_time - start_time).num_milliseconds() as f64 / 1000.0;

        SessionRecord {
            session_id: self.session_id.clone(),
            start_time,
            end_time,
            duration_seconds,
            timeline: timeline.entries().to_vec(),
            scores: engine.score_final(timeline),
            summary: engine.summarize(timeline.entries()),
        }
    }

    pub fn encode_to_json(
        &self,
        timeline: &Timeline,
        engine: &ScoreEngine,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<String, RapportError> {
        let record = self.encode(timeline, engine, start_time, end_time);
        serde_json::to_string_pretty(&record).map_err(RapportError::JsonError)
    }

    /// Suggested download name: `session_<id>_<YYYY-MM-DD>.json`
    pub fn file_name(&self, date: DateTime<Utc>) -> String {
        format!("session_{}_{}.json", self.session_id, date.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureSnapshot, PoseData};
    use chrono::{Duration, TimeZone};

    fn make_test_timeline() -> (Timeline, DateTime<Utc>) {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let mut timeline = Timeline::new();
        for i in 0..20 {
            let mut snapshot = FeatureSnapshot::empty(start + Duration::milliseconds(100 * i));
            snapshot.pose = Some(PoseData {
                shoulder_openness: 0.5,
                lean_angle: 0.0,
                stability: 1.0,
            });
            timeline.append(snapshot).unwrap();
        }
        (timeline, start)
    }

    #[test]
    fn test_encode_session_record() {
        let (timeline, start) = make_test_timeline();
        let encoder = SessionRecordEncoder::with_session_id("abc");
        let record = encoder.encode(&timeline, &ScoreEngine::new(), None, None);

        assert_eq!(record.session_id, "abc");
        assert_eq!(record.start_time, start);
        assert!((record.duration_seconds - 1.9).abs() < 1e-9);
        assert_eq!(record.timeline.len(), 20);
        // 0.5*50 + 1.0*30
        assert_eq!(record.scores.postural_openness, 55);
        assert_eq!(record.summary.posture_stability, 1.0);
    }

    #[test]
    fn test_explicit_bounds_win() {
        let (timeline, start) = make_test_timeline();
        let end = start + Duration::seconds(90);
        let record = SessionRecordEncoder::new().encode(
            &timeline,
            &ScoreEngine::new(),
            Some(start),
            Some(end),
        );
        assert_eq!(record.duration_seconds, 90.0);
    }

    #[test]
    fn test_encode_to_json() {
        let (timeline, _) = make_test_timeline();
        let json = SessionRecordEncoder::with_session_id("abc")
            .encode_to_json(&timeline, &ScoreEngine::new(), None, None)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["sessionId"], "abc");
        assert!(value["durationSeconds"].is_number());
        assert!(value["scores"]["posturalOpenness"].is_number());
        assert!(value["summary"]["emotionDistribution"]["happy"].is_number());
        assert!(value["timeline"][0]["pose"]["shoulderOpenness"].is_number());
    }

    #[test]
    fn test_empty_timeline_export() {
        let record =
            SessionRecordEncoder::new().encode(&Timeline::new(), &ScoreEngine::new(), None, None);
        assert_eq!(record.duration_seconds, 0.0);
        assert!(record.timeline.is_empty());
    }

    #[test]
    fn test_file_name() {
        let encoder = SessionRecordEncoder::with_session_id("abc");
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(encoder.file_name(date), "session_abc_2024-03-01.json");
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(
            SessionRecordEncoder::new().session_id(),
            SessionRecordEncoder::new().session_id()
        );
    }
}
