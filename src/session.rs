//! Live session
//!
//! Ties the frame analyzer and the conversation orchestrator to one session
//! timeline. Frame processing and conversation turns run independently; the
//! session only joins them at start (both reset), at end, and when the final
//! result and export are produced.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::analyzer::{lock_analyzer, FrameAnalyzer, SharedAnalyzer};
use crate::config::RapportConfig;
use crate::conversation::{
    ConversationMessage, ConversationServices, ConversationState, Orchestrator, TurnOutcome,
};
use crate::error::RapportError;
use crate::export::SessionRecordEncoder;
use crate::scoring::FinalResult;
use crate::services::TranscriptAnalyzer;
use crate::types::{
    CommunicationScores, ExpressionData, KeypointFrame, SessionRecord, TextAxisScores,
};

pub struct Session {
    config: RapportConfig,
    analyzer: SharedAnalyzer,
    orchestrator: Arc<Orchestrator>,
    transcript_analyzer: Arc<dyn TranscriptAnalyzer>,
    encoder: SessionRecordEncoder,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        services: ConversationServices,
        transcript_analyzer: Arc<dyn TranscriptAnalyzer>,
        config: RapportConfig,
    ) -> Result<Self, RapportError> {
        config.validate()?;
        Ok(Self {
            analyzer: FrameAnalyzer::new(&config).shared(),
            orchestrator: Orchestrator::new(services, &config.conversation),
            transcript_analyzer,
            encoder: SessionRecordEncoder::new(),
            started_at: None,
            ended_at: None,
            config,
        })
    }

    pub fn config(&self) -> &RapportConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        self.encoder.session_id()
    }

    /// Analyzer handle for the capture loop
    pub fn analyzer(&self) -> SharedAnalyzer {
        self.analyzer.clone()
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn state(&self) -> ConversationState {
        self.orchestrator.state()
    }

    pub fn messages(&self) -> Vec<ConversationMessage> {
        self.orchestrator.messages()
    }

    /// Reset the timeline, assign a new session id, and open the conversation
    pub async fn start(&mut self) -> Result<TurnOutcome, RapportError> {
        if self.orchestrator.state() != ConversationState::Idle {
            return Err(RapportError::InvalidState(format!(
                "session already running ({})",
                self.orchestrator.state()
            )));
        }

        lock_analyzer(&self.analyzer).reset();
        self.encoder = SessionRecordEncoder::new();
        self.started_at = Some(Utc::now());
        self.ended_at = None;
        info!(session_id = %self.encoder.session_id(), "session started");

        self.orchestrator.start_conversation().await
    }

    pub fn process_frame(
        &self,
        timestamp: DateTime<Utc>,
        keypoints: &KeypointFrame,
        expressions: Option<ExpressionData>,
    ) -> Result<CommunicationScores, RapportError> {
        lock_analyzer(&self.analyzer).process_frame(timestamp, keypoints, expressions)
    }

    pub fn subscribe_scores(&self) -> watch::Receiver<CommunicationScores> {
        lock_analyzer(&self.analyzer).subscribe_scores()
    }

    pub fn live_scores(&self) -> CommunicationScores {
        lock_analyzer(&self.analyzer).live_scores()
    }

    pub fn observe_transcript(&self, transcript: &str) -> bool {
        self.orchestrator.observe_transcript(transcript)
    }

    pub async fn send_message(&self) -> Result<TurnOutcome, RapportError> {
        self.orchestrator.send_message().await
    }

    pub async fn end(&mut self) {
        self.orchestrator.end_conversation().await;
        if self.started_at.is_some() && self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
        info!(session_id = %self.encoder.session_id(), "session ended");
    }

    /// Final detail scores, axis scores, and type over the whole timeline.
    ///
    /// Transcript analysis is best-effort: an empty transcript skips it and a
    /// failure falls back to neutral axis scores.
    pub async fn finalize(&self) -> FinalResult {
        let scores = lock_analyzer(&self.analyzer).final_scores();
        let transcript = self.orchestrator.user_transcript();

        let text = if transcript.trim().is_empty() {
            TextAxisScores::NEUTRAL
        } else {
            let duration = self.orchestrator.duration_seconds();
            match self
                .transcript_analyzer
                .analyze_transcript_axes(&transcript, duration)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "transcript analysis failed, using neutral axis scores");
                    TextAxisScores::NEUTRAL
                }
            }
        };

        FinalResult::new(scores, text)
    }

    pub fn export(&self) -> SessionRecord {
        let analyzer = lock_analyzer(&self.analyzer);
        self.encoder.encode(
            analyzer.timeline(),
            analyzer.engine(),
            self.started_at,
            self.ended_at,
        )
    }

    pub fn export_json(&self) -> Result<String, RapportError> {
        serde_json::to_string_pretty(&self.export()).map_err(RapportError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        AudioCapture, AudioClip, AudioOutput, ReplyGenerator, SpeechAudio, SpeechSynthesizer,
        Transcriber,
    };
    use crate::types::Emotion;
    use async_trait::async_trait;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTranscriber;

    #[async_trait]
    impl Transcriber for EchoTranscriber {
        async fn transcribe(&self, _clip: &AudioClip) -> Result<String, RapportError> {
            Ok("I think we should start with the budget".to_string())
        }
    }

    struct FixedGenerator;

    #[async_trait]
    impl ReplyGenerator for FixedGenerator {
        async fn generate_reply(
            &self,
            _history: &[ConversationMessage],
        ) -> Result<String, RapportError> {
            Ok("Tell me more.".to_string())
        }
    }

    struct SilentSynthesizer;

    #[async_trait]
    impl SpeechSynthesizer for SilentSynthesizer {
        async fn synthesize(&self, _text: &str) -> Result<SpeechAudio, RapportError> {
            Ok(SpeechAudio::default())
        }
    }

    struct NullOutput;

    #[async_trait]
    impl AudioOutput for NullOutput {
        async fn play(&self, _audio: &SpeechAudio) -> Result<(), RapportError> {
            Ok(())
        }

        async fn stop(&self) {}
    }

    struct FakeMicrophone;

    #[async_trait]
    impl AudioCapture for FakeMicrophone {
        async fn open(&self) -> Result<(), RapportError> {
            Ok(())
        }

        async fn close(&self) -> Result<AudioClip, RapportError> {
            Ok(AudioClip {
                mime_type: "audio/webm".to_string(),
                data: vec![1; 8],
            })
        }
    }

    struct MockTextAnalyzer {
        result: Option<TextAxisScores>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranscriptAnalyzer for MockTextAnalyzer {
        async fn analyze_transcript_axes(
            &self,
            _transcript: &str,
            _duration_seconds: f64,
        ) -> Result<TextAxisScores, RapportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .ok_or_else(|| RapportError::TextAnalysis("malformed response".to_string()))
        }
    }

    fn make_test_session(result: Option<TextAxisScores>) -> (Session, Arc<MockTextAnalyzer>) {
        let services = ConversationServices {
            transcriber: Arc::new(EchoTranscriber),
            generator: Arc::new(FixedGenerator),
            synthesizer: Arc::new(SilentSynthesizer),
            output: Arc::new(NullOutput),
            capture: Arc::new(FakeMicrophone),
        };
        let analyzer = Arc::new(MockTextAnalyzer {
            result,
            calls: AtomicUsize::new(0),
        });
        let session = Session::new(services, analyzer.clone(), RapportConfig::default()).unwrap();
        (session, analyzer)
    }

    fn feed_happy_frames(session: &Session, count: i64) {
        let start = Utc::now();
        for i in 0..count {
            session
                .process_frame(
                    start + Duration::milliseconds(100 * i),
                    &KeypointFrame::default(),
                    Some(ExpressionData {
                        happy: 0.8,
                        ..Default::default()
                    }),
                )
                .unwrap();
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = RapportConfig::default();
        config.capture.frames_per_second = 0;
        let services = ConversationServices {
            transcriber: Arc::new(EchoTranscriber),
            generator: Arc::new(FixedGenerator),
            synthesizer: Arc::new(SilentSynthesizer),
            output: Arc::new(NullOutput),
            capture: Arc::new(FakeMicrophone),
        };
        let analyzer = Arc::new(MockTextAnalyzer {
            result: None,
            calls: AtomicUsize::new(0),
        });

        assert!(Session::new(services, analyzer, config).is_err());
    }

    #[tokio::test]
    async fn test_finalize_without_speech_skips_text_analysis() {
        let (mut session, analyzer) = make_test_session(Some(TextAxisScores {
            assertiveness: 90.0,
            listening: 90.0,
            nonverbal_reading: 90.0,
        }));
        session.start().await.unwrap();
        session.end().await;

        let result = session.finalize().await;

        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.axis_scores.assertiveness, 50);
        assert_eq!(result.axis_scores.listening, 50);
        assert_eq!(result.axis_scores.nonverbal_reading, 50);
    }

    #[tokio::test]
    async fn test_finalize_uses_text_axes() {
        let (mut session, analyzer) = make_test_session(Some(TextAxisScores {
            assertiveness: 82.4,
            listening: 31.0,
            nonverbal_reading: 140.0,
        }));
        session.start().await.unwrap();
        session.send_message().await.unwrap();
        session.end().await;

        let result = session.finalize().await;

        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.axis_scores.assertiveness, 82);
        assert_eq!(result.axis_scores.listening, 31);
        assert_eq!(result.axis_scores.nonverbal_reading, 100);
        assert!(result.communication_type.assertive);
        assert!(!result.communication_type.connecting);
        assert!(result.communication_type.perceptive);
    }

    #[tokio::test]
    async fn test_finalize_falls_back_to_neutral_on_failure() {
        let (mut session, analyzer) = make_test_session(None);
        session.start().await.unwrap();
        session.send_message().await.unwrap();
        session.end().await;

        let result = session.finalize().await;

        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.axis_scores.assertiveness, 50);
        assert_eq!(result.axis_scores.listening, 50);
        assert_eq!(result.axis_scores.nonverbal_reading, 50);
        assert_eq!(result.communication_type.code(), "ACSP");
    }

    #[tokio::test]
    async fn test_export_covers_processed_frames() {
        let (mut session, _) = make_test_session(None);
        session.start().await.unwrap();
        feed_happy_frames(&session, 5);
        session.end().await;

        let record = session.export();

        assert_eq!(record.session_id, session.session_id());
        assert_eq!(record.timeline.len(), 5);
        assert_eq!(record.summary.dominant_emotion, Emotion::Happy);
        assert!(record.end_time >= record.start_time);

        let json = session.export_json().unwrap();
        assert!(json.contains("\"sessionId\""));
    }

    #[tokio::test]
    async fn test_restart_resets_timeline_and_id() {
        let (mut session, _) = make_test_session(None);
        session.start().await.unwrap();
        feed_happy_frames(&session, 3);
        session.end().await;
        let first_id = session.session_id().to_string();

        session.start().await.unwrap();

        assert_ne!(session.session_id(), first_id);
        assert_eq!(session.export().timeline.len(), 0);
        assert_eq!(session.live_scores(), CommunicationScores::default());
        assert_eq!(session.state(), ConversationState::UserSpeaking);
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid() {
        let (mut session, _) = make_test_session(None);
        session.start().await.unwrap();

        assert!(matches!(
            session.start().await,
            Err(RapportError::InvalidState(_))
        ));
    }
}
