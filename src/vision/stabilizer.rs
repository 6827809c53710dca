//! Temporal stabilization of per-frame detections
//!
//! Smooths corner sets over a short history, holds back sub-threshold jitter
//! until it has been confirmed over several frames, and keeps showing the
//! last good quadrilateral through short detection drop-outs. A long enough
//! drop-out resets everything.
//!
//! Distances are measured in video-native pixels.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::vision::contour::Detection;
use crate::vision::geometry::CornerSet;

/// Stabilizer constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Corner sets kept for the moving average
    pub max_history: usize,
    /// Consecutive agreeing frames before a small move is shown
    pub stable_threshold: u32,
    /// Mean corner distance separating jitter from a real move
    pub move_threshold: f64,
    /// Missed frames tolerated before the state resets
    pub max_no_update: u32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            max_history: 3,
            stable_threshold: 2,
            move_threshold: 20.0,
            max_no_update: 15,
        }
    }
}

/// Mutable tracking state owned by one stabilizer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StabilityState {
    pub stable_count: u32,
    pub no_update_count: u32,
    pub last_valid_corners: Option<CornerSet>,
    pub history: VecDeque<CornerSet>,
}

impl StabilityState {
    pub fn is_empty(&self) -> bool {
        self.last_valid_corners.is_none() && self.history.is_empty()
    }
}

/// Converts raw detections into a temporally consistent overlay
#[derive(Debug, Clone, Default)]
pub struct TemporalStabilizer {
    config: StabilizerConfig,
    state: StabilityState,
}

impl TemporalStabilizer {
    pub fn new() -> Self {
        Self::with_config(StabilizerConfig::default())
    }

    pub fn with_config(config: StabilizerConfig) -> Self {
        Self {
            config,
            state: StabilityState::default(),
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn state(&self) -> &StabilityState {
        &self.state
    }

    /// Last accepted corner set, if any
    pub fn last_valid_corners(&self) -> Option<CornerSet> {
        self.state.last_valid_corners
    }

    /// Drop all tracking state
    pub fn reset(&mut self) {
        self.state = StabilityState::default();
    }

    /// Feed one frame's detection, returning what should be displayed
    pub fn update(&mut self, detection: Detection) -> Detection {
        match detection {
            Detection::Detected(corners) => self.on_detected(corners),
            Detection::NotDetected => self.on_missed(),
        }
    }

    fn on_detected(&mut self, corners: CornerSet) -> Detection {
        self.state.no_update_count = 0;
        let smoothed = corners.averaged_with(self.state.history.iter());

        let Some(last) = self.state.last_valid_corners else {
            self.accept(smoothed);
            self.state.stable_count = 1;
            return Detection::Detected(smoothed);
        };

        let moved = smoothed.mean_distance(&last);
        if moved < self.config.move_threshold {
            self.state.stable_count += 1;
            if self.state.stable_count >= self.config.stable_threshold {
                self.accept(smoothed);
                Detection::Detected(smoothed)
            } else {
                Detection::Detected(last)
            }
        } else {
            debug!("Detection jumped {:.1}px, restarting stability count", moved);
            self.state.stable_count = 1;
            self.accept(smoothed);
            Detection::Detected(smoothed)
        }
    }

    fn on_missed(&mut self) -> Detection {
        self.state.no_update_count += 1;

        let output = match self.state.last_valid_corners {
            Some(last) => {
                self.state.stable_count = 0;
                Detection::Detected(last)
            }
            None => Detection::NotDetected,
        };

        if self.state.no_update_count > self.config.max_no_update {
            debug!(
                "No detection for {} frames, resetting stabilizer",
                self.state.no_update_count
            );
            self.reset();
        }

        output
    }

    fn accept(&mut self, corners: CornerSet) {
        self.state.last_valid_corners = Some(corners);
        self.state.history.push_back(corners);
        while self.state.history.len() > self.config.max_history {
            self.state.history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::geometry::Point;

    fn quad(offset: f64) -> CornerSet {
        CornerSet::new(
            Point::new(100.0 + offset, 100.0),
            Point::new(300.0 + offset, 100.0),
            Point::new(300.0 + offset, 400.0),
            Point::new(100.0 + offset, 400.0),
        )
    }

    #[test]
    fn test_first_detection_is_shown_immediately() {
        let mut stabilizer = TemporalStabilizer::new();
        let out = stabilizer.update(Detection::Detected(quad(0.0)));
        assert_eq!(out, Detection::Detected(quad(0.0)));
        assert_eq!(stabilizer.state().stable_count, 1);
        assert_eq!(stabilizer.state().history.len(), 1);
        assert_eq!(stabilizer.last_valid_corners(), Some(quad(0.0)));
    }

    #[test]
    fn test_small_moves_wait_for_stability() {
        let config = StabilizerConfig {
            stable_threshold: 3,
            ..Default::default()
        };
        let mut stabilizer = TemporalStabilizer::with_config(config);

        let first = stabilizer.update(Detection::Detected(quad(0.0)));
        assert_eq!(first, Detection::Detected(quad(0.0)));

        // Count reaches 2 < 3: display stays on the accepted set
        let second = stabilizer.update(Detection::Detected(quad(6.0)));
        assert_eq!(second, Detection::Detected(quad(0.0)));

        // Count reaches 3: smoothed set is accepted and shown
        let third = stabilizer.update(Detection::Detected(quad(6.0)));
        let expected = quad(6.0).averaged_with([&quad(0.0)]);
        assert_eq!(third, Detection::Detected(expected));
        assert_eq!(stabilizer.last_valid_corners(), Some(expected));

        // Tracks from then on
        let fourth = stabilizer.update(Detection::Detected(quad(6.0)));
        assert_ne!(fourth, Detection::Detected(quad(0.0)));
        assert!(stabilizer.state().stable_count >= 3);
    }

    #[test]
    fn test_large_jump_is_a_fresh_detection() {
        let mut stabilizer = TemporalStabilizer::new();
        stabilizer.update(Detection::Detected(quad(0.0)));
        stabilizer.update(Detection::Detected(quad(1.0)));
        assert_eq!(stabilizer.state().stable_count, 2);

        let jumped = stabilizer.update(Detection::Detected(quad(200.0)));
        let Detection::Detected(shown) = jumped else {
            panic!("expected a detection");
        };
        assert_eq!(stabilizer.state().stable_count, 1);
        assert_eq!(stabilizer.last_valid_corners(), Some(shown));
        assert!(shown.top_left().x > 100.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut stabilizer = TemporalStabilizer::new();
        for i in 0..10 {
            stabilizer.update(Detection::Detected(quad(i as f64 * 100.0)));
        }
        assert_eq!(stabilizer.state().history.len(), 3);
    }

    #[test]
    fn test_missed_frames_hold_last_corners() {
        let mut stabilizer = TemporalStabilizer::new();
        stabilizer.update(Detection::Detected(quad(0.0)));
        let held = stabilizer.update(Detection::NotDetected);
        assert_eq!(held, Detection::Detected(quad(0.0)));
        assert_eq!(stabilizer.state().stable_count, 0);
        assert_eq!(stabilizer.state().no_update_count, 1);

        // A valid detection resets the miss counter
        stabilizer.update(Detection::Detected(quad(0.0)));
        assert_eq!(stabilizer.state().no_update_count, 0);
    }

    #[test]
    fn test_reset_after_max_no_update() {
        let mut stabilizer = TemporalStabilizer::new();
        stabilizer.update(Detection::Detected(quad(0.0)));

        let max = stabilizer.config().max_no_update;
        for _ in 0..max {
            let out = stabilizer.update(Detection::NotDetected);
            assert!(out.is_detected());
        }
        assert!(stabilizer.last_valid_corners().is_some());

        // Exceeding the cap: this frame still shows the held set, then state is gone
        let last_held = stabilizer.update(Detection::NotDetected);
        assert!(last_held.is_detected());
        assert!(stabilizer.last_valid_corners().is_none());
        assert!(stabilizer.state().is_empty());
        assert_eq!(stabilizer.state().no_update_count, 0);

        assert_eq!(stabilizer.update(Detection::NotDetected), Detection::NotDetected);
    }

    #[test]
    fn test_no_detection_ever() {
        let mut stabilizer = TemporalStabilizer::new();
        for _ in 0..40 {
            assert_eq!(stabilizer.update(Detection::NotDetected), Detection::NotDetected);
        }
    }
}
