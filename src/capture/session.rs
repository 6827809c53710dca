//! Detection session
//!
//! Owns the detector and stabilizer for one capture session and drives them
//! from a frame source on a tokio task. Detection runs on the blocking pool;
//! the stabilizer is only ever touched from the loop task.

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::frame::CapturedFrame;
use crate::capture::{FrameSource, LoopConfig};
use crate::error::Result;
use crate::shared::messages::DetectionEvent;
use crate::vision::contour::{ContourDetector, Detection, DetectorConfig};
use crate::vision::geometry::CornerSet;
use crate::vision::stabilizer::{StabilizerConfig, TemporalStabilizer};

/// Counters reported when a session ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames run through detection without error
    pub frames: u64,
    /// Frames in which the detector itself found a document
    pub detections: u64,
    /// Iterations that failed and backed off
    pub errors: u64,
}

/// Per-capture-session detection state
pub struct DetectionSession {
    detector: Arc<ContourDetector>,
    stabilizer: TemporalStabilizer,
    loop_config: LoopConfig,
    current: Arc<RwLock<Option<CornerSet>>>,
    frame_index: u64,
}

impl DetectionSession {
    pub fn new(
        detector_config: DetectorConfig,
        stabilizer_config: StabilizerConfig,
        loop_config: LoopConfig,
    ) -> Self {
        Self {
            detector: Arc::new(ContourDetector::with_config(detector_config)),
            stabilizer: TemporalStabilizer::with_config(stabilizer_config),
            loop_config,
            current: Arc::new(RwLock::new(None)),
            frame_index: 0,
        }
    }

    /// Last accepted corner set, in video-native pixels
    pub fn current_corners(&self) -> Option<CornerSet> {
        *self.current.read()
    }

    /// Forget all tracking state; the next detection starts fresh
    pub fn reset(&mut self) {
        self.stabilizer.reset();
        *self.current.write() = None;
        info!("Detection state reset");
    }

    /// Detect and stabilize a single frame
    pub async fn process_frame(&mut self, frame: CapturedFrame) -> Result<(Detection, Detection)> {
        let detector = Arc::clone(&self.detector);
        let raw = tokio::task::spawn_blocking(move || detector.detect_frame(&frame)).await??;
        let shown = self.stabilizer.update(raw);
        *self.current.write() = self.stabilizer.last_valid_corners();
        Ok((raw, shown))
    }

    /// Run the loop on a tokio task until the source ends or the handle stops it
    pub fn spawn<S>(self, source: S, events: Sender<DetectionEvent>) -> DetectionHandle
    where
        S: FrameSource + 'static,
    {
        let token = CancellationToken::new();
        let reset_requested = Arc::new(AtomicBool::new(false));
        let current = Arc::clone(&self.current);

        let task = tokio::spawn(self.run(
            source,
            events,
            token.clone(),
            Arc::clone(&reset_requested),
        ));

        DetectionHandle {
            token,
            reset_requested,
            current,
            task,
        }
    }

    async fn run<S>(
        mut self,
        mut source: S,
        events: Sender<DetectionEvent>,
        token: CancellationToken,
        reset_requested: Arc<AtomicBool>,
    ) -> SessionSummary
    where
        S: FrameSource,
    {
        let mut summary = SessionSummary::default();
        info!(
            "Detection loop started at {} fps",
            self.loop_config.frame_rate
        );

        while !token.is_cancelled() {
            if reset_requested.swap(false, Ordering::AcqRel) {
                self.reset();
            }

            let start = Instant::now();
            let delay = match self.iterate(&mut source).await {
                Ok(Some((raw, shown))) => {
                    summary.frames += 1;
                    if raw.is_detected() {
                        summary.detections += 1;
                    }
                    let event = DetectionEvent::Overlay {
                        frame_index: self.frame_index,
                        corners: shown.corners().copied(),
                    };
                    self.frame_index += 1;
                    debug!("Frame processed in {:?}", start.elapsed());
                    if events.send(event).is_err() {
                        debug!("Event receiver dropped, stopping detection loop");
                        break;
                    }
                    self.loop_config.frame_interval()
                }
                Ok(None) => {
                    info!("Frame source ended");
                    break;
                }
                Err(e) => {
                    summary.errors += 1;
                    warn!("Frame processing failed: {}", e);
                    if events.send(DetectionEvent::Error(e.to_string())).is_err() {
                        break;
                    }
                    self.loop_config.error_backoff()
                }
            };

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(
            "Detection loop stopped: {} frames, {} detections, {} errors",
            summary.frames, summary.detections, summary.errors
        );
        let _ = events.send(DetectionEvent::Stopped);
        summary
    }

    async fn iterate<S>(&mut self, source: &mut S) -> Result<Option<(Detection, Detection)>>
    where
        S: FrameSource,
    {
        let Some(frame) = source.next_frame().await? else {
            return Ok(None);
        };
        self.process_frame(frame).await.map(Some)
    }
}

/// Control handle for a running detection loop
pub struct DetectionHandle {
    token: CancellationToken,
    reset_requested: Arc<AtomicBool>,
    current: Arc<RwLock<Option<CornerSet>>>,
    task: JoinHandle<SessionSummary>,
}

impl DetectionHandle {
    /// Ask the loop to exit; an in-flight frame is finished first
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Clear tracking state before the next frame
    pub fn reset(&self) {
        self.reset_requested.store(true, Ordering::Release);
    }

    /// Last accepted corner set, read by the capture action
    pub fn current_corners(&self) -> Option<CornerSet> {
        *self.current.read()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit
    pub async fn join(self) -> Result<SessionSummary> {
        Ok(self.task.await?)
    }
}
