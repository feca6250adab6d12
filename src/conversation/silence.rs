//! Silence detector
//!
//! Watches the live (unfinalized) transcript and reports end-of-turn after it
//! stops changing for a quiet period. It never decides anything about the
//! transcript content: the finalized transcription comes from the recorded
//! audio.
//!
//! The timer task reads the shared [`StateCell`] when it fires and only
//! signals while the conversation is still `user_speaking`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::state::{ConversationState, StateCell};

#[derive(Debug, Default)]
struct SilenceInner {
    armed: bool,
    last_transcript: String,
    pending: Option<CancellationToken>,
}

impl SilenceInner {
    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

#[derive(Debug)]
pub struct SilenceDetector {
    timeout: Duration,
    state: StateCell,
    fired_tx: mpsc::UnboundedSender<()>,
    inner: Mutex<SilenceInner>,
}

impl SilenceDetector {
    /// Create a detector and the receiver its firings are delivered on
    pub fn new(timeout: Duration, state: StateCell) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let detector = Self {
            timeout,
            state,
            fired_tx,
            inner: Mutex::new(SilenceInner::default()),
        };
        (detector, fired_rx)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start watching a new turn. The transcript baseline resets to empty.
    pub fn arm(&self) {
        let mut inner = self.lock();
        inner.cancel_pending();
        inner.last_transcript.clear();
        inner.armed = true;
    }

    /// Stop watching and invalidate any pending timer
    pub fn disarm(&self) {
        let mut inner = self.lock();
        inner.cancel_pending();
        inner.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed
    }

    pub fn has_pending_timer(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Feed the latest live transcript.
    ///
    /// Any change restarts the quiet-period timer. Returns `true` when a timer
    /// was (re)scheduled.
    pub fn observe(&self, transcript: &str) -> bool {
        let mut inner = self.lock();
        if !inner.armed || inner.last_transcript == transcript {
            return false;
        }
        inner.last_transcript = transcript.to_string();
        inner.cancel_pending();

        if transcript.is_empty() {
            return false;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("silence detector observed speech outside a tokio runtime");
                return false;
            }
        };

        let token = CancellationToken::new();
        inner.pending = Some(token.clone());

        let timeout = self.timeout;
        let state = self.state.clone();
        let fired_tx = self.fired_tx.clone();
        handle.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let current = state.current();
                    if current == ConversationState::UserSpeaking {
                        debug!(timeout_ms = timeout.as_millis() as u64, "silence detected");
                        let _ = fired_tx.send(());
                    } else {
                        debug!(state = %current, "ignoring stale silence timer");
                    }
                }
            }
        });
        true
    }

    fn lock(&self) -> MutexGuard<'_, SilenceInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SilenceDetector {
    fn drop(&mut self) {
        self.lock().cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    const TIMEOUT: Duration = Duration::from_millis(2000);

    fn make_test_detector() -> (SilenceDetector, mpsc::UnboundedReceiver<()>, StateCell) {
        let state = StateCell::new();
        state.set(ConversationState::UserSpeaking);
        let (detector, rx) = SilenceDetector::new(TIMEOUT, state.clone());
        detector.arm();
        (detector, rx, state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_quiet_period() {
        let (detector, mut rx, _state) = make_test_detector();
        let start = Instant::now();

        assert!(detector.observe("hello"));
        assert!(rx.recv().await.is_some());
        assert!(start.elapsed() >= TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_text_restarts_timer() {
        let (detector, mut rx, _state) = make_test_detector();
        let start = Instant::now();

        detector.observe("hello");
        tokio::time::advance(Duration::from_millis(1500)).await;
        detector.observe("hello there");

        assert!(rx.recv().await.is_some());
        assert!(start.elapsed() >= Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_text_does_not_restart_timer() {
        let (detector, mut rx, _state) = make_test_detector();
        let start = Instant::now();

        detector.observe("hello");
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(!detector.observe("hello"));

        assert!(rx.recv().await.is_some());
        assert!(start.elapsed() < Duration::from_millis(3500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_is_noop() {
        for moved_on in [ConversationState::Processing, ConversationState::AiSpeaking] {
            let (detector, mut rx, state) = make_test_detector();

            detector.observe("hello");
            // A manual send already moved the conversation on
            state.set(moved_on);

            let fired = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
            assert!(fired.is_err(), "timer fired while {}", moved_on);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_cancels_pending_timer() {
        let (detector, mut rx, _state) = make_test_detector();

        detector.observe("hello");
        assert!(detector.has_pending_timer());
        detector.disarm();
        assert!(!detector.has_pending_timer());

        let fired = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_input_while_disarmed_or_empty() {
        let (detector, mut rx, _state) = make_test_detector();

        assert!(!detector.observe(""));
        detector.disarm();
        assert!(!detector.observe("hello"));
        assert!(!detector.is_armed());

        let fired = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_resets_baseline() {
        let (detector, mut rx, _state) = make_test_detector();

        detector.observe("same words");
        detector.arm();
        // Same text as before re-arming counts as new speech
        assert!(detector.observe("same words"));
        assert!(rx.recv().await.is_some());
    }
}
