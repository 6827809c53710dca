//! Message types emitted by the detection loop

use crate::vision::geometry::CornerSet;

/// Messages sent from the detection loop to a rendering surface
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    /// Overlay to draw for a processed frame; `None` clears the overlay
    Overlay {
        frame_index: u64,
        corners: Option<CornerSet>,
    },
    /// A frame could not be processed; the loop backs off and continues
    Error(String),
    /// The loop has exited
    Stopped,
}

impl DetectionEvent {
    pub fn corners(&self) -> Option<&CornerSet> {
        match self {
            DetectionEvent::Overlay { corners, .. } => corners.as_ref(),
            _ => None,
        }
    }
}
