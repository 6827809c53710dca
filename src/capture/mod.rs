//! Camera Capture Layer
//!
//! Frame sources feeding the detection loop, and the loop itself.

pub mod frame;
pub mod session;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use crate::error::Result;
use crate::vision::geometry::CornerSet;

pub use frame::CapturedFrame;
pub use session::{DetectionHandle, DetectionSession, SessionSummary};

/// Frame size assumed when a stream reports no dimensions yet
pub const FALLBACK_FRAME_SIZE: (u32, u32) = (640, 480);

/// Detection loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Target frames per second
    pub frame_rate: u32,
    /// Delay after a failed iteration
    pub error_backoff_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            error_backoff_ms: 1000,
        }
    }
}

impl LoopConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.frame_rate.max(1)))
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

/// Source of video frames.
///
/// `Ok(None)` means the stream has ended.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<Option<CapturedFrame>>;
}

/// Replays a fixed list of frames once
#[derive(Debug, Default)]
pub struct StaticFrames {
    frames: VecDeque<CapturedFrame>,
}

impl StaticFrames {
    pub fn new(frames: impl IntoIterator<Item = CapturedFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn from_images(images: impl IntoIterator<Item = RgbaImage>) -> Self {
        Self::new(images.into_iter().map(CapturedFrame::from_image))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl FrameSource for StaticFrames {
    async fn next_frame(&mut self) -> Result<Option<CapturedFrame>> {
        Ok(self.frames.pop_front())
    }
}

/// Full-frame corner set used when nothing was detected at capture time.
///
/// A zero dimension means the stream has not reported its size; the
/// fallback frame size is used instead.
pub fn default_corners(width: u32, height: u32) -> CornerSet {
    let (w, h) = if width == 0 || height == 0 {
        FALLBACK_FRAME_SIZE
    } else {
        (width, height)
    };
    CornerSet::full_frame(f64::from(w), f64::from(h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_corners() {
        assert_eq!(default_corners(1280, 720), CornerSet::full_frame(1280.0, 720.0));
        assert_eq!(default_corners(0, 720), CornerSet::full_frame(640.0, 480.0));
    }

    #[test]
    fn test_loop_config_intervals() {
        let config = LoopConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_millis(33));
        assert_eq!(config.error_backoff(), Duration::from_secs(1));

        let zero = LoopConfig {
            frame_rate: 0,
            ..Default::default()
        };
        assert_eq!(zero.frame_interval(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_static_frames_replay_once() {
        let mut source = StaticFrames::from_images(vec![RgbaImage::new(2, 2), RgbaImage::new(3, 3)]);
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.next_frame().await.unwrap().unwrap().width, 2);
        assert_eq!(source.next_frame().await.unwrap().unwrap().width, 3);
        assert!(source.next_frame().await.unwrap().is_none());
    }
}
