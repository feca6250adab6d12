//! External collaborator contracts
//!
//! The engine never talks to a detector, a hosted model, or an audio device
//! directly. Callers plug implementations of these traits into the capture
//! loop and the conversation orchestrator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::conversation::ConversationMessage;
use crate::error::RapportError;
use crate::types::{ExpressionData, KeypointFrame, TextAxisScores};

/// One captured video frame, opaque to the engine
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub captured_at: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Audio recorded during one user turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioClip {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl AudioClip {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Playable synthesized speech
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechAudio {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait KeypointDetector: Send + Sync {
    /// Any subset of the keypoint sets may be absent
    async fn detect_keypoints(&self, frame: &VideoFrame) -> Result<KeypointFrame, RapportError>;
}

#[async_trait]
pub trait ExpressionDetector: Send + Sync {
    /// `None` when no face was found
    async fn detect_expressions(
        &self,
        frame: &VideoFrame,
    ) -> Result<Option<ExpressionData>, RapportError>;
}

#[async_trait]
pub trait FrameSource: Send {
    /// Next frame from the camera; `None` once the source is exhausted
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>, RapportError>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, RapportError>;
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Next assistant line given the full history (empty for the opening line)
    async fn generate_reply(&self, history: &[ConversationMessage]) -> Result<String, RapportError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio, RapportError>;
}

#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Resolves once playback has finished
    async fn play(&self, audio: &SpeechAudio) -> Result<(), RapportError>;

    /// Stop any playback immediately
    async fn stop(&self);
}

#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Acquire the microphone and start recording
    async fn open(&self) -> Result<(), RapportError>;

    /// Stop recording, release the microphone, and return what was captured
    async fn close(&self) -> Result<AudioClip, RapportError>;
}

#[async_trait]
pub trait TranscriptAnalyzer: Send + Sync {
    async fn analyze_transcript_axes(
        &self,
        transcript: &str,
        duration_seconds: f64,
    ) -> Result<TextAxisScores, RapportError>;
}
