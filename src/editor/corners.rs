//! Interactive corner editing
//!
//! Maps pointer gestures in display space to corner updates in image-native
//! space. The image is shown "contain"-fitted inside a container; every
//! pointer delta is divided by the display scale before it is applied, and
//! every resulting coordinate is clamped to the image bounds.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::editor::photo::PhotoItem;
use crate::error::{Result, ScanError};
use crate::vision::geometry::{point_in_polygon, CornerSet, Point, ScaleOffset};
use crate::vision::rectify::PerspectiveRectifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Hit radius of corner and midpoint handles, in display pixels
    pub handle_radius: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { handle_radius: 20.0 }
    }
}

/// Where an image sits inside its display container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMapping {
    pub transform: ScaleOffset,
    pub image_width: f64,
    pub image_height: f64,
}

impl DisplayMapping {
    /// Fit the image inside the container preserving aspect ratio, centered.
    ///
    /// Any zero size yields the identity mapping.
    pub fn contain(image_width: u32, image_height: u32, container_width: f64, container_height: f64) -> Self {
        let iw = f64::from(image_width);
        let ih = f64::from(image_height);
        if iw <= 0.0 || ih <= 0.0 || container_width <= 0.0 || container_height <= 0.0 {
            return Self::identity(image_width, image_height);
        }

        let image_ratio = iw / ih;
        let container_ratio = container_width / container_height;
        let (width, height) = if image_ratio > container_ratio {
            (container_width, container_width / image_ratio)
        } else {
            (container_height * image_ratio, container_height)
        };

        Self {
            transform: ScaleOffset {
                scale_x: width / iw,
                scale_y: height / ih,
                offset_x: (container_width - width) / 2.0,
                offset_y: (container_height - height) / 2.0,
            },
            image_width: iw,
            image_height: ih,
        }
    }

    /// Image shown at its native size at the container origin
    pub fn identity(image_width: u32, image_height: u32) -> Self {
        Self {
            transform: ScaleOffset::IDENTITY,
            image_width: f64::from(image_width),
            image_height: f64::from(image_height),
        }
    }

    pub fn to_display(&self, p: Point) -> Point {
        self.transform.apply(p)
    }

    pub fn to_image(&self, p: Point) -> Point {
        self.transform.invert(p)
    }

    /// Clamp a point into `[0, width] x [0, height]`
    pub fn clamp(&self, p: Point) -> Point {
        p.clamp_to(self.image_width, self.image_height)
    }
}

/// What a drag gesture moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// One corner
    Corner(usize),
    /// Both endpoints of edge `i` (corner `i` to corner `i + 1`)
    EdgeMidpoint(usize),
    /// All four corners
    WholeQuad,
}

/// An in-progress drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub mode: DragMode,
    /// Pointer position at drag start, display space
    pub anchor: Point,
    /// Corners at drag start, image space
    pub snapshot: CornerSet,
}

/// Handle position plus the direction of the edge it sits on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidpointHandle {
    pub position: Point,
    /// Edge angle in degrees, `atan2` of the edge vector
    pub angle: f64,
}

/// Corner editor for one photo
#[derive(Debug, Clone)]
pub struct CornerEditor {
    config: EditorConfig,
    mapping: DisplayMapping,
    committed: CornerSet,
    points: CornerSet,
    drag: Option<DragSession>,
}

impl CornerEditor {
    pub fn new(corners: CornerSet, mapping: DisplayMapping) -> Self {
        Self::with_config(corners, mapping, EditorConfig::default())
    }

    pub fn with_config(corners: CornerSet, mapping: DisplayMapping, config: EditorConfig) -> Self {
        Self {
            config,
            mapping,
            committed: corners,
            points: corners,
            drag: None,
        }
    }

    /// Start editing a photo's raw image shown in a container
    pub fn for_photo(photo: &PhotoItem, container_width: f64, container_height: f64, config: EditorConfig) -> Self {
        let (w, h) = photo.raw().dimensions();
        let mapping = DisplayMapping::contain(w, h, container_width, container_height);
        Self::with_config(photo.corners(), mapping, config)
    }

    /// Current working corners, image space
    pub fn points(&self) -> CornerSet {
        self.points
    }

    /// Last confirmed corners
    pub fn committed(&self) -> CornerSet {
        self.committed
    }

    pub fn mapping(&self) -> &DisplayMapping {
        &self.mapping
    }

    /// Container resized; working points are unaffected
    pub fn set_mapping(&mut self, mapping: DisplayMapping) {
        self.mapping = mapping;
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn display_points(&self) -> [Point; 4] {
        self.points.0.map(|p| self.mapping.to_display(p))
    }

    pub fn display_midpoints(&self) -> [MidpointHandle; 4] {
        let display = self.display_points();
        std::array::from_fn(|i| {
            let a = display[i];
            let b = display[(i + 1) % 4];
            MidpointHandle {
                position: Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0),
                angle: (b.y - a.y).atan2(b.x - a.x).to_degrees(),
            }
        })
    }

    /// Resolve a display-space pointer to the gesture it would start.
    ///
    /// Corner handles win over midpoint handles, which win over the body.
    pub fn hit_test(&self, pointer: Point) -> Option<DragMode> {
        let radius = self.config.handle_radius;

        let nearest = |candidates: &[Point]| {
            candidates
                .iter()
                .enumerate()
                .map(|(i, p)| (i, p.distance(&pointer)))
                .filter(|(_, d)| *d <= radius)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i)
        };

        if let Some(i) = nearest(&self.display_points()) {
            return Some(DragMode::Corner(i));
        }
        let midpoints = self.display_midpoints().map(|m| m.position);
        if let Some(i) = nearest(&midpoints) {
            return Some(DragMode::EdgeMidpoint(i));
        }
        if point_in_polygon(&self.display_points(), &pointer) {
            return Some(DragMode::WholeQuad);
        }
        None
    }

    /// Start a drag, replacing any drag already in progress
    pub fn begin_drag(&mut self, mode: DragMode, pointer: Point) -> Result<()> {
        if let DragMode::Corner(i) | DragMode::EdgeMidpoint(i) = mode {
            if i >= 4 {
                return Err(ScanError::InvalidInput(format!("handle index {} out of range", i)));
            }
        }
        self.drag = Some(DragSession {
            mode,
            anchor: pointer,
            snapshot: self.points,
        });
        debug!("Drag started: {:?}", mode);
        Ok(())
    }

    /// Hit-test `pointer` and start the matching drag
    pub fn begin_drag_at(&mut self, pointer: Point) -> Option<DragMode> {
        let mode = self.hit_test(pointer)?;
        self.begin_drag(mode, pointer).ok()?;
        Some(mode)
    }

    /// Apply the pointer's displacement since drag start.
    ///
    /// Returns false when no drag is active.
    pub fn drag_move(&mut self, pointer: Point) -> bool {
        let Some(session) = self.drag else {
            return false;
        };

        let (dx, dy) = self
            .mapping
            .transform
            .invert_delta(pointer.x - session.anchor.x, pointer.y - session.anchor.y);
        let snapshot = session.snapshot;
        let mut points = snapshot;

        match session.mode {
            DragMode::Corner(i) => {
                points.0[i] = self.mapping.clamp(snapshot.0[i].offset(dx, dy));
            }
            DragMode::EdgeMidpoint(i) => {
                let a = snapshot.0[i];
                let b = snapshot.0[(i + 1) % 4];
                let (ex, ey) = (b.x - a.x, b.y - a.y);
                let len = ex.hypot(ey);
                if len > 0.0 {
                    let (px, py) = (-ey / len, ex / len);
                    let along = dx * px + dy * py;
                    points.0[i] = self.mapping.clamp(a.offset(px * along, py * along));
                    points.0[(i + 1) % 4] = self.mapping.clamp(b.offset(px * along, py * along));
                }
            }
            DragMode::WholeQuad => {
                points = snapshot.map(|p| self.mapping.clamp(p.offset(dx, dy)));
            }
        }

        self.points = points;
        true
    }

    /// Finish the gesture; no rectification happens here
    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Commit the working corners and re-rectify the photo.
    ///
    /// On failure the photo's images and corners are left as they were and
    /// the working points stay available for another attempt.
    pub fn confirm(&mut self, photo: &mut PhotoItem, rectifier: &PerspectiveRectifier) -> Result<()> {
        self.drag = None;
        photo.rectify_with(self.points, rectifier)?;
        self.committed = self.points;
        info!("Corner edit confirmed for photo {}", photo.id());
        Ok(())
    }

    /// Discard uncommitted changes
    pub fn cancel(&mut self) {
        self.drag = None;
        self.points = self.committed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn square() -> CornerSet {
        CornerSet::new(
            Point::new(100.0, 100.0),
            Point::new(300.0, 100.0),
            Point::new(300.0, 300.0),
            Point::new(100.0, 300.0),
        )
    }

    /// 400x400 image shown at half size in a 200x300 container
    fn half_scale_editor() -> CornerEditor {
        CornerEditor::new(square(), DisplayMapping::contain(400, 400, 200.0, 300.0))
    }

    fn within_bounds(points: &CornerSet, w: f64, h: f64) -> bool {
        points
            .points()
            .iter()
            .all(|p| p.x >= 0.0 && p.x <= w && p.y >= 0.0 && p.y <= h)
    }

    #[test]
    fn test_contain_mapping() {
        let wide = DisplayMapping::contain(800, 400, 400.0, 400.0);
        assert_eq!(wide.transform.scale_x, 0.5);
        assert_eq!(wide.transform.offset_x, 0.0);
        assert_eq!(wide.transform.offset_y, 100.0);

        let tall = DisplayMapping::contain(400, 800, 400.0, 400.0);
        assert_eq!(tall.transform.offset_x, 100.0);
        assert_eq!(tall.transform.offset_y, 0.0);

        let p = Point::new(123.0, 45.0);
        let back = wide.to_image(wide.to_display(p));
        assert!(back.distance(&p) < 1e-9);

        let empty = DisplayMapping::contain(0, 0, 100.0, 100.0);
        assert_eq!(empty.transform, ScaleOffset::IDENTITY);
    }

    #[test]
    fn test_corner_drag_scales_delta() {
        let mut editor = half_scale_editor();
        let start = editor.display_points()[CornerSet::TOP_LEFT];
        editor.begin_drag(DragMode::Corner(0), start).unwrap();
        // 10 display pixels are 20 image pixels
        assert!(editor.drag_move(start.offset(10.0, -5.0)));
        assert_eq!(editor.points().top_left(), Point::new(120.0, 90.0));
        // Other corners untouched
        assert_eq!(editor.points().bottom_right(), square().bottom_right());
    }

    #[test]
    fn test_edge_drag_moves_perpendicular_only() {
        let mut editor = CornerEditor::new(square(), DisplayMapping::identity(400, 400));
        let top_mid = editor.display_midpoints()[0].position;
        editor.begin_drag(DragMode::EdgeMidpoint(0), top_mid).unwrap();
        // Sideways component is discarded for the horizontal top edge
        editor.drag_move(top_mid.offset(50.0, 30.0));
        let points = editor.points();
        assert_eq!(points.top_left(), Point::new(100.0, 130.0));
        assert_eq!(points.top_right(), Point::new(300.0, 130.0));
        assert_eq!(points.bottom_left(), square().bottom_left());
    }

    #[test]
    fn test_whole_quad_drag_deforms_at_border() {
        let mut editor = CornerEditor::new(square(), DisplayMapping::identity(400, 400));
        editor.begin_drag(DragMode::WholeQuad, Point::new(200.0, 200.0)).unwrap();
        editor.drag_move(Point::new(350.0, 200.0));
        let points = editor.points();
        assert_eq!(points.top_left(), Point::new(250.0, 100.0));
        // Right side slides along the boundary
        assert_eq!(points.top_right(), Point::new(400.0, 100.0));
    }

    #[test]
    fn test_huge_drags_stay_inside_image() {
        let deltas = [(1e6, 1e6), (-1e6, 3e5), (-1e9, -1e9), (7e4, -2e7)];
        let modes = [
            DragMode::Corner(0),
            DragMode::Corner(2),
            DragMode::EdgeMidpoint(1),
            DragMode::EdgeMidpoint(3),
            DragMode::WholeQuad,
        ];
        for mode in modes {
            for (dx, dy) in deltas {
                let mut editor = half_scale_editor();
                let anchor = Point::new(100.0, 150.0);
                editor.begin_drag(mode, anchor).unwrap();
                editor.drag_move(anchor.offset(dx, dy));
                assert!(
                    within_bounds(&editor.points(), 400.0, 400.0),
                    "{:?} by ({}, {}) escaped: {:?}",
                    mode,
                    dx,
                    dy,
                    editor.points()
                );
            }
        }
    }

    #[test]
    fn test_hit_test_priority() {
        let editor = CornerEditor::new(square(), DisplayMapping::identity(400, 400));
        assert_eq!(editor.hit_test(Point::new(105.0, 98.0)), Some(DragMode::Corner(0)));
        assert_eq!(editor.hit_test(Point::new(200.0, 110.0)), Some(DragMode::EdgeMidpoint(0)));
        assert_eq!(editor.hit_test(Point::new(295.0, 200.0)), Some(DragMode::EdgeMidpoint(1)));
        assert_eq!(editor.hit_test(Point::new(180.0, 220.0)), Some(DragMode::WholeQuad));
        assert_eq!(editor.hit_test(Point::new(10.0, 10.0)), None);
    }

    #[test]
    fn test_midpoint_angles() {
        let editor = CornerEditor::new(square(), DisplayMapping::identity(400, 400));
        let angles = editor.display_midpoints().map(|m| m.angle);
        for (angle, expected) in angles.iter().zip([0.0, 90.0, 180.0, -90.0]) {
            assert!((angle - expected).abs() < 1e-9, "{} vs {}", angle, expected);
        }
    }

    #[test]
    fn test_end_drag_and_cancel() {
        let mut editor = CornerEditor::new(square(), DisplayMapping::identity(400, 400));
        assert!(!editor.drag_move(Point::new(0.0, 0.0)));

        editor.begin_drag_at(Point::new(100.0, 100.0)).unwrap();
        editor.drag_move(Point::new(150.0, 150.0));
        editor.end_drag();
        assert!(!editor.is_dragging());
        assert_ne!(editor.points(), square());

        editor.cancel();
        assert_eq!(editor.points(), square());
        assert_eq!(editor.committed(), square());
    }

    #[test]
    fn test_invalid_handle_index() {
        let mut editor = half_scale_editor();
        assert!(editor.begin_drag(DragMode::Corner(4), Point::default()).is_err());
        assert!(!editor.is_dragging());
    }

    #[test]
    fn test_confirm_rectifies_photo() {
        let mut photo = PhotoItem::new(RgbaImage::new(400, 400), CornerSet::full_frame(400.0, 400.0));
        let mut editor = CornerEditor::for_photo(&photo, 400.0, 400.0, EditorConfig::default());
        editor.begin_drag(DragMode::Corner(0), Point::new(0.0, 0.0)).unwrap();
        editor.drag_move(Point::new(100.0, 100.0));
        editor.end_drag();

        editor.confirm(&mut photo, &PerspectiveRectifier::new()).unwrap();
        assert_eq!(photo.corners(), editor.points());
        assert_eq!(editor.committed(), editor.points());
        assert!(photo.rectified().is_some());
    }

    #[test]
    fn test_failed_confirm_keeps_photo() {
        let mut photo = PhotoItem::new(RgbaImage::new(400, 400), CornerSet::full_frame(400.0, 400.0));
        let mut editor = CornerEditor::for_photo(&photo, 400.0, 400.0, EditorConfig::default());
        // Collapse the top edge onto the bottom one
        editor.begin_drag(DragMode::WholeQuad, Point::new(200.0, 200.0)).unwrap();
        editor.drag_move(Point::new(200.0, 1e6));

        assert!(editor.confirm(&mut photo, &PerspectiveRectifier::new()).is_err());
        assert_eq!(photo.corners(), CornerSet::full_frame(400.0, 400.0));
        assert!(photo.rectified().is_none());
        assert_eq!(editor.committed(), CornerSet::full_frame(400.0, 400.0));
    }
}
