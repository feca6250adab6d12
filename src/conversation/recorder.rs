//! Turn recorder
//!
//! Owns the microphone lifecycle for user turns. The device is acquired on
//! `start` and released on every exit path (`stop`, `force_stop`). The silence
//! detector is armed only while the device is recording.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::silence::SilenceDetector;
use crate::error::RapportError;
use crate::services::{AudioCapture, AudioClip};

pub struct Recorder {
    capture: Arc<dyn AudioCapture>,
    silence: Arc<SilenceDetector>,
    recording: AtomicBool,
}

impl Recorder {
    pub fn new(capture: Arc<dyn AudioCapture>, silence: Arc<SilenceDetector>) -> Self {
        Self {
            capture,
            silence,
            recording: AtomicBool::new(false),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Acquire the microphone and arm silence detection.
    ///
    /// Any failure to acquire is reported as `DeviceUnavailable`.
    pub async fn start(&self) -> Result<(), RapportError> {
        if self.is_recording() {
            return Ok(());
        }

        self.capture.open().await.map_err(|e| match e {
            RapportError::DeviceUnavailable(_) => e,
            other => RapportError::DeviceUnavailable(other.to_string()),
        })?;

        self.recording.store(true, Ordering::SeqCst);
        self.silence.arm();
        info!("microphone acquired");
        Ok(())
    }

    /// Stop recording and release the microphone.
    ///
    /// Returns `None` when nothing was recording.
    pub async fn stop(&self) -> Result<Option<AudioClip>, RapportError> {
        self.silence.disarm();
        if !self.recording.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }

        let clip = self.capture.close().await;
        info!("microphone released");
        clip.map(Some)
    }

    /// Stop and discard the recording, logging instead of failing
    pub async fn force_stop(&self) {
        if let Err(e) = self.stop().await {
            warn!(error = %e, "failed to close capture device cleanly");
        }
    }
}
