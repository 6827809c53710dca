//! Document contour detection
//!
//! Finds a document-shaped quadrilateral in a single RGBA frame:
//! grayscale, Gaussian blur, Canny edges, one morphological close, then
//! external contours only. Candidates are validated against area, fill and
//! proportion limits and the largest survivor is reduced to four corners.
//!
//! All points produced here are in the frame's own pixel space (video-native).

use image::{GrayImage, RgbaImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::point::Point as PixelPoint;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::capture::frame::CapturedFrame;
use crate::error::{Result, ScanError};
use crate::vision::geometry::{pixel_bounding_box, polygon_area, CornerSet, Point};

/// Outcome of running detection on one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    Detected(CornerSet),
    NotDetected,
}

impl Detection {
    pub fn corners(&self) -> Option<&CornerSet> {
        match self {
            Detection::Detected(corners) => Some(corners),
            Detection::NotDetected => None,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, Detection::Detected(_))
    }
}

impl From<Option<CornerSet>> for Detection {
    fn from(value: Option<CornerSet>) -> Self {
        value.map_or(Detection::NotDetected, Detection::Detected)
    }
}

/// Tunables for the edge pipeline and contour validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Gaussian sigma; 0.8 matches a 3x3 kernel
    pub blur_sigma: f32,
    /// Canny low threshold
    pub canny_low: f32,
    /// Canny high threshold
    pub canny_high: f32,
    /// Closing radius in pixels (2 gives a 5x5 square element)
    pub close_radius: u8,
    /// Absolute minimum contour area in pixels
    pub min_area_px: f64,
    /// Minimum contour area as a fraction of the frame
    pub min_area_ratio: f64,
    /// Maximum contour area as a fraction of the frame
    pub max_area_ratio: f64,
    /// Minimum contour area over bounding box area
    pub min_extent: f64,
    /// Maximum bounding box long/short side ratio
    pub max_aspect_ratio: f64,
    /// Minimum bounding box side as a fraction of the matching frame side
    pub min_dimension_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 0.8,
            canny_low: 30.0,
            canny_high: 100.0,
            close_radius: 2,
            min_area_px: 2000.0,
            min_area_ratio: 0.05,
            max_area_ratio: 0.95,
            min_extent: 0.3,
            max_aspect_ratio: 10.0,
            min_dimension_ratio: 0.1,
        }
    }
}

/// Per-frame document detector. Stateless apart from its configuration.
#[derive(Debug, Clone, Default)]
pub struct ContourDetector {
    config: DetectorConfig,
}

impl ContourDetector {
    pub fn new() -> Self {
        Self::with_config(DetectorConfig::default())
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run detection on a captured RGBA frame
    pub fn detect_frame(&self, frame: &CapturedFrame) -> Result<Detection> {
        self.detect_rgba(&frame.data, frame.width, frame.height)
    }

    /// Run detection on a raw RGBA buffer of the given dimensions
    pub fn detect_rgba(&self, data: &[u8], width: u32, height: u32) -> Result<Detection> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ScanError::InvalidFrame(format!(
                "{}x{} RGBA frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        let img = RgbaImage::from_raw(width, height, data.to_vec())
            .ok_or_else(|| ScanError::InvalidFrame("buffer does not fit frame dimensions".into()))?;
        let gray = image::DynamicImage::ImageRgba8(img).to_luma8();
        Ok(self.detect_gray(&gray))
    }

    /// Run detection on an already converted grayscale image
    pub fn detect_gray(&self, gray: &GrayImage) -> Detection {
        let start = Instant::now();
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Detection::NotDetected;
        }

        let edges = self.edge_map(gray);
        let contours = find_contours::<i32>(&edges);

        let mut best: Option<(f64, Vec<Point>)> = None;
        let mut candidates = 0usize;
        for contour in contours
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        {
            let points: Vec<Point> = contour
                .points
                .iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            let Some(area) = self.validate(&points, width, height) else {
                continue;
            };
            candidates += 1;
            // Strictly greater keeps the first-found contour on ties
            if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
                best = Some((area, points));
            }
        }

        let detection = match best {
            Some((_, points)) => extract_corners(&points).into(),
            None => Detection::NotDetected,
        };

        debug!(
            "Contour detection on {}x{} in {:?}: {} candidates, detected={}",
            width,
            height,
            start.elapsed(),
            candidates,
            detection.is_detected()
        );

        detection
    }

    /// Blur, Canny and close; white pixels are edges
    fn edge_map(&self, gray: &GrayImage) -> GrayImage {
        let blurred = if self.config.blur_sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(gray, self.config.blur_sigma)
        } else {
            gray.clone()
        };
        let edges = imageproc::edges::canny(&blurred, self.config.canny_low, self.config.canny_high);
        if self.config.close_radius > 0 {
            imageproc::morphology::close(&edges, Norm::LInf, self.config.close_radius)
        } else {
            edges
        }
    }

    /// Returns the contour area when every document-shape rule holds
    fn validate(&self, points: &[Point], width: u32, height: u32) -> Option<f64> {
        let cfg = &self.config;
        let frame_w = f64::from(width);
        let frame_h = f64::from(height);
        let frame_area = frame_w * frame_h;

        let area = polygon_area(points);
        let min_area = cfg.min_area_px.max(frame_area * cfg.min_area_ratio);
        if area < min_area || area > frame_area * cfg.max_area_ratio {
            return None;
        }

        let rect = pixel_bounding_box(points)?;
        if area / rect.area() < cfg.min_extent {
            return None;
        }
        if rect.aspect_ratio() > cfg.max_aspect_ratio {
            return None;
        }
        if rect.width < frame_w * cfg.min_dimension_ratio
            || rect.height < frame_h * cfg.min_dimension_ratio
        {
            return None;
        }

        Some(area)
    }
}

/// Center of the minimum-area rectangle enclosing `points`
fn min_area_rect_center(points: &[Point]) -> Option<Point> {
    if points.len() < 3 {
        return None;
    }
    let pixels: Vec<PixelPoint<i32>> = points
        .iter()
        .map(|p| PixelPoint::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    let rect = imageproc::geometry::min_area_rect(&pixels);
    let (sx, sy) = rect
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + f64::from(p.x), sy + f64::from(p.y)));
    Some(Point::new(sx / 4.0, sy / 4.0))
}

/// Reduce a contour to its four quadrant extremes around the min-area-rect center.
///
/// Vertices exactly on either center axis belong to no quadrant and are
/// skipped. Returns `None` unless all four quadrants produced a vertex.
pub fn extract_corners(points: &[Point]) -> Option<CornerSet> {
    let center = min_area_rect_center(points)?;
    quadrant_extremes(points, center)
}

/// Farthest vertex from `center` in each strict quadrant
pub fn quadrant_extremes(points: &[Point], center: Point) -> Option<CornerSet> {
    // Indexed in CornerSet order: TL, TR, BR, BL
    let mut best: [Option<(f64, Point)>; 4] = [None; 4];

    for p in points {
        let slot = if p.x < center.x && p.y < center.y {
            CornerSet::TOP_LEFT
        } else if p.x > center.x && p.y < center.y {
            CornerSet::TOP_RIGHT
        } else if p.x > center.x && p.y > center.y {
            CornerSet::BOTTOM_RIGHT
        } else if p.x < center.x && p.y > center.y {
            CornerSet::BOTTOM_LEFT
        } else {
            continue;
        };

        let dist = p.distance(&center);
        if best[slot].map_or(true, |(d, _)| dist > d) {
            best[slot] = Some((dist, *p));
        }
    }

    let [Some(tl), Some(tr), Some(br), Some(bl)] = best else {
        return None;
    };
    Some(CornerSet::new(tl.1, tr.1, br.1, bl.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Dark frame with a bright axis-aligned rectangle
    fn frame_with_rect(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if x >= x0 && x < x1 && y >= y0 && y < y1 {
                Rgba([240, 240, 240, 255])
            } else {
                Rgba([20, 20, 20, 255])
            }
        })
    }

    #[test]
    fn test_detects_bright_document() {
        let img = frame_with_rect(200, 150, 40, 30, 160, 120);
        let detector = ContourDetector::new();
        let detection = detector.detect_rgba(img.as_raw(), 200, 150).unwrap();

        let corners = detection.corners().expect("document should be detected");
        let expected = CornerSet::new(
            Point::new(40.0, 30.0),
            Point::new(160.0, 30.0),
            Point::new(160.0, 120.0),
            Point::new(40.0, 120.0),
        );
        for (got, want) in corners.points().iter().zip(expected.points()) {
            assert!(
                got.distance(want) < 6.0,
                "corner {:?} too far from {:?}",
                got,
                want
            );
        }
    }

    /// Dark frame with several bright axis-aligned rectangles
    fn frame_with_rects(w: u32, h: u32, rects: &[(u32, u32, u32, u32)]) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let inside = rects
                .iter()
                .any(|&(x0, y0, x1, y1)| x >= x0 && x < x1 && y >= y0 && y < y1);
            if inside {
                Rgba([240, 240, 240, 255])
            } else {
                Rgba([20, 20, 20, 255])
            }
        })
    }

    fn assert_near(corners: &CornerSet, (x0, y0, x1, y1): (u32, u32, u32, u32)) {
        let expected = CornerSet::new(
            Point::new(f64::from(x0), f64::from(y0)),
            Point::new(f64::from(x1), f64::from(y0)),
            Point::new(f64::from(x1), f64::from(y1)),
            Point::new(f64::from(x0), f64::from(y1)),
        );
        for (got, want) in corners.points().iter().zip(expected.points()) {
            assert!(
                got.distance(want) < 6.0,
                "corner {:?} too far from {:?}",
                got,
                want
            );
        }
    }

    #[test]
    fn test_largest_document_wins() {
        let small = (20, 40, 80, 100);
        let large = (160, 50, 280, 150);
        let img = frame_with_rects(320, 200, &[small, large]);
        let detection = ContourDetector::new().detect_rgba(img.as_raw(), 320, 200).unwrap();
        assert_near(detection.corners().expect("document should be detected"), large);

        // Same result whichever side the larger one is on
        let small = (240, 40, 300, 100);
        let large = (20, 50, 140, 150);
        let img = frame_with_rects(320, 200, &[small, large]);
        let detection = ContourDetector::new().detect_rgba(img.as_raw(), 320, 200).unwrap();
        assert_near(detection.corners().expect("document should be detected"), large);
    }

    #[test]
    fn test_equal_areas_keep_first_found() {
        // Contours are found in raster order, so the upper rectangle comes first
        let upper = (20, 20, 100, 90);
        let lower = (200, 100, 280, 170);
        let img = frame_with_rects(320, 200, &[upper, lower]);
        let detection = ContourDetector::new().detect_rgba(img.as_raw(), 320, 200).unwrap();
        assert_near(detection.corners().expect("document should be detected"), upper);
    }

    #[test]
    fn test_uniform_frame_is_not_detected() {
        let img = RgbaImage::from_pixel(120, 80, Rgba([128, 128, 128, 255]));
        let detection = ContourDetector::new().detect_rgba(img.as_raw(), 120, 80).unwrap();
        assert_eq!(detection, Detection::NotDetected);
    }

    #[test]
    fn test_small_speck_is_rejected() {
        let img = frame_with_rect(200, 150, 90, 70, 100, 80);
        let detection = ContourDetector::new().detect_rgba(img.as_raw(), 200, 150).unwrap();
        assert_eq!(detection, Detection::NotDetected);
    }

    #[test]
    fn test_buffer_size_mismatch_is_an_error() {
        let result = ContourDetector::new().detect_rgba(&[0u8; 10], 4, 4);
        assert!(matches!(result, Err(ScanError::InvalidFrame(_))));
    }

    #[test]
    fn test_sliver_fails_validation() {
        let detector = ContourDetector::new();
        // 300x10 box in a 400x400 frame: thin sliver
        let sliver = vec![
            Point::new(10.0, 10.0),
            Point::new(309.0, 10.0),
            Point::new(309.0, 19.0),
            Point::new(10.0, 19.0),
        ];
        assert!(detector.validate(&sliver, 400, 400).is_none());

        let good = vec![
            Point::new(50.0, 50.0),
            Point::new(249.0, 50.0),
            Point::new(249.0, 299.0),
            Point::new(50.0, 299.0),
        ];
        assert!(detector.validate(&good, 400, 400).is_some());
    }

    #[test]
    fn test_near_full_frame_is_rejected() {
        let detector = ContourDetector::new();
        let full = vec![
            Point::new(0.0, 0.0),
            Point::new(399.0, 0.0),
            Point::new(399.0, 399.0),
            Point::new(0.0, 399.0),
        ];
        assert!(detector.validate(&full, 400, 400).is_none());
    }

    #[test]
    fn test_quadrant_extremes_picks_farthest() {
        let center = Point::new(50.0, 50.0);
        let points = vec![
            Point::new(10.0, 10.0),
            Point::new(20.0, 20.0),
            Point::new(90.0, 5.0),
            Point::new(95.0, 95.0),
            Point::new(5.0, 90.0),
        ];
        let corners = quadrant_extremes(&points, center).unwrap();
        assert_eq!(corners.top_left(), Point::new(10.0, 10.0));
        assert_eq!(corners.top_right(), Point::new(90.0, 5.0));
        assert_eq!(corners.bottom_right(), Point::new(95.0, 95.0));
        assert_eq!(corners.bottom_left(), Point::new(5.0, 90.0));
    }

    #[test]
    fn test_points_on_center_axes_are_ignored() {
        let center = Point::new(50.0, 50.0);
        // Only axis points plus three quadrants: bottom-left is missing
        let points = vec![
            Point::new(50.0, 0.0),
            Point::new(0.0, 50.0),
            Point::new(10.0, 10.0),
            Point::new(90.0, 10.0),
            Point::new(90.0, 90.0),
        ];
        assert!(quadrant_extremes(&points, center).is_none());
    }

    #[test]
    fn test_detection_from_option() {
        let set = CornerSet::full_frame(1.0, 1.0);
        assert_eq!(Detection::from(Some(set)), Detection::Detected(set));
        assert_eq!(Detection::from(None), Detection::NotDetected);
    }
}
