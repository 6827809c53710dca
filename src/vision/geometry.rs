//! Geometry utilities
//!
//! Points, the ordered four-corner quadrilateral used everywhere in the
//! pipeline, and small polygon helpers. Nothing in here knows which
//! coordinate space a point lives in; callers document that themselves.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// A 2D point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point shifted by (dx, dy)
    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    /// Point clamped per coordinate into `[0, max_x] x [0, max_y]`
    pub fn clamp_to(&self, max_x: f64, max_y: f64) -> Point {
        Point::new(self.x.clamp(0.0, max_x), self.y.clamp(0.0, max_y))
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// Four corners in fixed order `[top_left, top_right, bottom_right, bottom_left]`.
///
/// Consumers index positionally; the order is never permuted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerSet(pub [Point; 4]);

impl CornerSet {
    pub const TOP_LEFT: usize = 0;
    pub const TOP_RIGHT: usize = 1;
    pub const BOTTOM_RIGHT: usize = 2;
    pub const BOTTOM_LEFT: usize = 3;

    pub fn new(top_left: Point, top_right: Point, bottom_right: Point, bottom_left: Point) -> Self {
        Self([top_left, top_right, bottom_right, bottom_left])
    }

    /// Build from a slice, rejecting anything that is not exactly four points
    pub fn from_slice(points: &[Point]) -> Result<Self> {
        let points: [Point; 4] = points.try_into().map_err(|_| {
            ScanError::InvalidInput(format!("expected 4 corner points, got {}", points.len()))
        })?;
        Ok(Self(points))
    }

    /// Quadrilateral covering a whole `width` x `height` image
    pub fn full_frame(width: f64, height: f64) -> Self {
        Self([
            Point::new(0.0, 0.0),
            Point::new(width, 0.0),
            Point::new(width, height),
            Point::new(0.0, height),
        ])
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    pub fn top_left(&self) -> Point {
        self.0[Self::TOP_LEFT]
    }

    pub fn top_right(&self) -> Point {
        self.0[Self::TOP_RIGHT]
    }

    pub fn bottom_right(&self) -> Point {
        self.0[Self::BOTTOM_RIGHT]
    }

    pub fn bottom_left(&self) -> Point {
        self.0[Self::BOTTOM_LEFT]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(Point::is_finite)
    }

    /// True when this is exactly the full-frame quadrilateral of a `width` x `height` image
    pub fn is_full_frame(&self, width: f64, height: f64) -> bool {
        *self == Self::full_frame(width, height)
    }

    /// Mean per-corner distance to another set (index-wise)
    pub fn mean_distance(&self, other: &CornerSet) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a.distance(b))
            .sum::<f64>()
            / 4.0
    }

    /// Per-index average of `self` with every set in `others`
    pub fn averaged_with<'a, I>(&self, others: I) -> CornerSet
    where
        I: IntoIterator<Item = &'a CornerSet>,
    {
        let mut sums = self.0;
        let mut count = 1.0;
        for set in others {
            for (sum, p) in sums.iter_mut().zip(set.0.iter()) {
                sum.x += p.x;
                sum.y += p.y;
            }
            count += 1.0;
        }
        CornerSet(sums.map(|p| Point::new(p.x / count, p.y / count)))
    }

    /// Edge lengths as `(top, right, bottom, left)`
    pub fn edge_lengths(&self) -> (f64, f64, f64, f64) {
        let [tl, tr, br, bl] = self.0;
        (tl.distance(&tr), tr.distance(&br), br.distance(&bl), bl.distance(&tl))
    }

    /// Midpoint of edge `index`, the edge running from corner `index` to `index + 1`
    pub fn edge_midpoint(&self, index: usize) -> Point {
        let a = self.0[index % 4];
        let b = self.0[(index + 1) % 4];
        Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    /// Apply `f` to every corner, keeping the order
    pub fn map<F: FnMut(Point) -> Point>(&self, f: F) -> CornerSet {
        CornerSet(self.0.map(f))
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.0)
    }

    pub fn contains(&self, p: &Point) -> bool {
        point_in_polygon(&self.0, p)
    }
}

/// Axis-aligned bounding box, pixel-inclusive like an integer image rect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Long side over short side; infinite for a zero-width box
    pub fn aspect_ratio(&self) -> f64 {
        let long = self.width.max(self.height);
        let short = self.width.min(self.height);
        if short <= 0.0 {
            f64::INFINITY
        } else {
            long / short
        }
    }
}

/// Bounding box of integer pixel coordinates.
///
/// Width and height count pixels, so a single point has a 1x1 box.
pub fn pixel_bounding_box(points: &[Point]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox {
        min_x,
        min_y,
        width: max_x - min_x + 1.0,
        height: max_y - min_y + 1.0,
    })
}

/// Unsigned polygon area (shoelace formula); the polygon is implicitly closed
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum();
    twice.abs() / 2.0
}

/// Perimeter of the closed polygon
pub fn polygon_perimeter(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.distance(b))
        .sum()
}

/// Even-odd ray casting test
pub fn point_in_polygon(polygon: &[Point], p: &Point) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Axis-aligned scale followed by translation.
///
/// Maps `p` to `(p.x * scale_x + offset_x, p.y * scale_y + offset_y)`. With
/// equal scales this is a similarity transform; the editor uses it to move
/// between image-native and display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleOffset {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for ScaleOffset {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ScaleOffset {
    pub const IDENTITY: ScaleOffset = ScaleOffset {
        scale_x: 1.0,
        scale_y: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    pub fn apply(&self, p: Point) -> Point {
        Point::new(p.x * self.scale_x + self.offset_x, p.y * self.scale_y + self.offset_y)
    }

    /// Inverse mapping. Zero scales map to the offset-removed point unscaled.
    pub fn invert(&self, p: Point) -> Point {
        let sx = if self.scale_x == 0.0 { 1.0 } else { self.scale_x };
        let sy = if self.scale_y == 0.0 { 1.0 } else { self.scale_y };
        Point::new((p.x - self.offset_x) / sx, (p.y - self.offset_y) / sy)
    }

    /// Convert a displacement (no translation) back through the scale
    pub fn invert_delta(&self, dx: f64, dy: f64) -> (f64, f64) {
        let sx = if self.scale_x == 0.0 { 1.0 } else { self.scale_x };
        let sy = if self.scale_y == 0.0 { 1.0 } else { self.scale_y };
        (dx / sx, dy / sy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        ]
    }

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_polygon_area_and_perimeter() {
        let sq = square(10.0);
        assert!((polygon_area(&sq) - 100.0).abs() < 1e-9);
        assert!((polygon_perimeter(&sq) - 40.0).abs() < 1e-9);

        // Orientation must not matter
        let mut reversed = sq.clone();
        reversed.reverse();
        assert!((polygon_area(&reversed) - 100.0).abs() < 1e-9);

        assert_eq!(polygon_area(&sq[..2]), 0.0);
    }

    #[test]
    fn test_corner_set_from_slice_rejects_wrong_length() {
        let pts = square(5.0);
        assert!(CornerSet::from_slice(&pts).is_ok());
        assert!(matches!(
            CornerSet::from_slice(&pts[..3]),
            Err(ScanError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_full_frame_detection() {
        let set = CornerSet::full_frame(800.0, 600.0);
        assert!(set.is_full_frame(800.0, 600.0));
        assert!(!set.is_full_frame(800.0, 601.0));
        assert_eq!(set.top_right(), Point::new(800.0, 0.0));
        assert_eq!(set.bottom_left(), Point::new(0.0, 600.0));
    }

    #[test]
    fn test_averaged_with_history() {
        let a = CornerSet::full_frame(10.0, 10.0);
        let b = CornerSet::full_frame(20.0, 20.0);
        let avg = a.averaged_with([&b]);
        assert_eq!(avg.top_right(), Point::new(15.0, 0.0));
        assert_eq!(avg.bottom_right(), Point::new(15.0, 15.0));

        // No history leaves the set unchanged
        let same = a.averaged_with(std::iter::empty());
        assert_eq!(same, a);
    }

    #[test]
    fn test_mean_distance() {
        let a = CornerSet::full_frame(10.0, 10.0);
        let b = a.map(|p| p.offset(3.0, 4.0));
        assert!((a.mean_distance(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_bounding_box() {
        let bb = pixel_bounding_box(&square(9.0)).unwrap();
        assert_eq!(bb.width, 10.0);
        assert_eq!(bb.height, 10.0);
        assert!((bb.aspect_ratio() - 1.0).abs() < 1e-9);
        assert!(pixel_bounding_box(&[]).is_none());
    }

    #[test]
    fn test_point_in_polygon() {
        let sq = square(10.0);
        assert!(point_in_polygon(&sq, &Point::new(5.0, 5.0)));
        assert!(!point_in_polygon(&sq, &Point::new(15.0, 5.0)));
        assert!(!point_in_polygon(&sq, &Point::new(-1.0, 5.0)));
    }

    #[test]
    fn test_scale_offset_roundtrip() {
        let t = ScaleOffset {
            scale_x: 0.5,
            scale_y: 0.25,
            offset_x: 10.0,
            offset_y: 20.0,
        };
        let p = Point::new(100.0, 40.0);
        let mapped = t.apply(p);
        assert_eq!(mapped, Point::new(60.0, 30.0));
        let back = t.invert(mapped);
        assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
        assert_eq!(t.invert_delta(5.0, 5.0), (10.0, 20.0));
    }

    #[test]
    fn test_clamp_to() {
        let p = Point::new(-5.0, 900.0).clamp_to(800.0, 600.0);
        assert_eq!(p, Point::new(0.0, 600.0));
    }
}
