//! Vision Layer
//!
//! Document outline detection on live frames, temporal smoothing of the
//! detected outline, perspective rectification and photo filters.

pub mod contour;
pub mod filters;
pub mod geometry;
pub mod ocr;
pub mod rectify;
pub mod stabilizer;

pub use contour::{ContourDetector, Detection, DetectorConfig};
pub use filters::{apply_filter, FilterKind};
pub use geometry::{CornerSet, Point, ScaleOffset};
pub use ocr::{FixedTextOcr, OcrEngine, OcrOutput, TextBlock};
pub use rectify::{corner_projection, PerspectiveRectifier, RectifyConfig, Rectified};
pub use stabilizer::{StabilityState, StabilizerConfig, TemporalStabilizer};
