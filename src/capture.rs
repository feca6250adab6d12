//! Frame capture loop
//!
//! Pulls frames at a fixed cadence, runs keypoint and expression detection
//! concurrently, and feeds the merged result to the frame analyzer. Runs
//! independently of the conversation; it never waits on a turn.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analyzer::{lock_analyzer, SharedAnalyzer};
use crate::config::CaptureConfig;
use crate::error::RapportError;
use crate::services::{ExpressionDetector, FrameSource, KeypointDetector};

#[derive(Clone)]
pub struct CaptureDetectors {
    pub keypoints: Arc<dyn KeypointDetector>,
    pub expressions: Arc<dyn ExpressionDetector>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub processed: usize,
    pub skipped: usize,
}

/// Run until the source is exhausted or `cancel` fires.
///
/// Detection failures skip the frame. A `DeviceUnavailable` error from the
/// source ends the loop with that error.
pub async fn run_capture_loop<S>(
    source: &mut S,
    detectors: &CaptureDetectors,
    analyzer: SharedAnalyzer,
    config: &CaptureConfig,
    cancel: CancellationToken,
) -> Result<CaptureStats, RapportError>
where
    S: FrameSource + ?Sized,
{
    let mut ticker = tokio::time::interval(config.frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = CaptureStats::default();
    info!(fps = config.frames_per_second, "capture loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let frame = match source.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("frame source exhausted");
                break;
            }
            Err(e @ RapportError::DeviceUnavailable(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "failed to read frame");
                stats.skipped += 1;
                continue;
            }
        };

        let (keypoints, expressions) = tokio::join!(
            detectors.keypoints.detect_keypoints(&frame),
            detectors.expressions.detect_expressions(&frame),
        );
        let (keypoints, expressions) = match (keypoints, expressions) {
            (Ok(keypoints), Ok(expressions)) => (keypoints, expressions),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "detection failed, skipping frame");
                stats.skipped += 1;
                continue;
            }
        };

        let result =
            lock_analyzer(&analyzer).process_frame(frame.captured_at, &keypoints, expressions);
        match result {
            Ok(_) => stats.processed += 1,
            Err(e) => {
                warn!(error = %e, "frame rejected");
                stats.skipped += 1;
            }
        }
    }

    info!(
        processed = stats.processed,
        skipped = stats.skipped,
        "capture loop stopped"
    );
    Ok(stats)
}
