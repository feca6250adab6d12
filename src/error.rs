//! Error types for Rapport

use thiserror::Error;

/// Errors that can occur while scoring signals or running a conversation session
#[derive(Debug, Error)]
pub enum RapportError {
    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Reply generation failed: {0}")]
    Generation(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Audio playback failed: {0}")]
    Playback(String),

    #[error("Transcript analysis failed: {0}")]
    TextAnalysis(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Invalid conversation state: {0}")]
    InvalidState(String),

    #[error("Snapshot out of order: {0}")]
    OutOfOrderSnapshot(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RapportError {
    /// Collaborator failures keep the session interactive; device and state
    /// failures abort the current attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RapportError::Transcription(_)
                | RapportError::Generation(_)
                | RapportError::Synthesis(_)
                | RapportError::Playback(_)
                | RapportError::TextAnalysis(_)
                | RapportError::Detection(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_failures_are_recoverable() {
        assert!(RapportError::Transcription("timeout".into()).is_recoverable());
        assert!(RapportError::Generation("500".into()).is_recoverable());
        assert!(RapportError::Synthesis("quota".into()).is_recoverable());
        assert!(!RapportError::DeviceUnavailable("no mic".into()).is_recoverable());
        assert!(!RapportError::InvalidState("busy".into()).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = RapportError::DeviceUnavailable("microphone".to_string());
        assert_eq!(err.to_string(), "Capture device unavailable: microphone");
    }
}
