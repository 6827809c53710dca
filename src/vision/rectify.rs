//! Perspective rectification
//!
//! Solves the homography taking a four-corner selection onto an upright
//! rectangle and resamples the source through it. Corner sets are expected
//! in the source image's own pixel space.

use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{Result, ScanError};
use crate::vision::geometry::{CornerSet, Point};

/// Output size limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Smallest allowed output side in pixels
    pub min_dimension: u32,
    /// Largest allowed output side in pixels
    pub max_dimension: u32,
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            min_dimension: 200,
            max_dimension: 2000,
        }
    }
}

/// Result of a rectification request
#[derive(Debug, Clone)]
pub enum Rectified {
    /// The selection was the full frame; keep the existing image
    Unchanged,
    /// Newly warped image
    Warped(RgbaImage),
}

impl Rectified {
    pub fn into_image(self) -> Option<RgbaImage> {
        match self {
            Rectified::Unchanged => None,
            Rectified::Warped(img) => Some(img),
        }
    }
}

/// Projective transform taking `src[i]` onto `dst[i]`.
///
/// Correspondence order is preserved so the output is neither mirrored nor
/// rotated. Fails when three of either set's points are collinear.
pub fn corner_projection(src: &CornerSet, dst: &CornerSet) -> Result<Projection> {
    if has_collinear_triple(src) || has_collinear_triple(dst) {
        return Err(ScanError::DegenerateTransform);
    }
    let to_f32 = |c: &CornerSet| c.0.map(|p| (p.x as f32, p.y as f32));
    Projection::from_control_points(to_f32(src), to_f32(dst)).ok_or(ScanError::DegenerateTransform)
}

fn has_collinear_triple(corners: &CornerSet) -> bool {
    let p = corners.points();
    let (top, right, bottom, left) = corners.edge_lengths();
    let scale = top.max(right).max(bottom).max(left);
    if scale <= 0.0 {
        return true;
    }
    (0..4).any(|skip| {
        let [a, b, c]: [Point; 3] = match skip {
            0 => [p[1], p[2], p[3]],
            1 => [p[0], p[2], p[3]],
            2 => [p[0], p[1], p[3]],
            _ => [p[0], p[1], p[2]],
        };
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        cross.abs() <= 1e-9 * scale * scale
    })
}

/// Computes output sizes and performs the warp
#[derive(Debug, Clone, Default)]
pub struct PerspectiveRectifier {
    config: RectifyConfig,
}

impl PerspectiveRectifier {
    pub fn new() -> Self {
        Self::with_config(RectifyConfig::default())
    }

    pub fn with_config(config: RectifyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RectifyConfig {
        &self.config
    }

    /// Output size for a selection: longest opposite edges, then clamped.
    ///
    /// The scale is uniform and prefers the minimum bound; only when the
    /// aspect ratio makes both bounds unreachable is the long side capped
    /// on its own.
    pub fn output_size(&self, corners: &CornerSet) -> Result<(u32, u32)> {
        let (top, right, bottom, left) = corners.edge_lengths();
        let width = top.max(bottom).ceil();
        let height = left.max(right).ceil();
        if !(width.is_finite() && height.is_finite()) || width < 1.0 || height < 1.0 {
            return Err(ScanError::InvalidInput(format!(
                "selection collapses to {}x{}",
                width, height
            )));
        }

        let RectifyConfig {
            min_dimension,
            max_dimension,
        } = self.config;
        if min_dimension == 0 || min_dimension > max_dimension {
            return Err(ScanError::InvalidInput(format!(
                "output bounds {}..={} are empty",
                min_dimension, max_dimension
            )));
        }
        let min = f64::from(min_dimension);
        let max = f64::from(max_dimension);
        let mut scale = 1.0;
        if width.max(height) > max {
            scale = max / width.max(height);
        }
        if width.min(height) * scale < min {
            scale = min / width.min(height);
        }

        let out_w = (width * scale).round().clamp(min, max) as u32;
        let out_h = (height * scale).round().clamp(min, max) as u32;
        Ok((out_w, out_h))
    }

    /// Rectify an encoded image (PNG, JPEG, ...)
    pub fn rectify_encoded(
        &self,
        bytes: &[u8],
        corners: &[Point],
        size: Option<(u32, u32)>,
    ) -> Result<Rectified> {
        let source = image::load_from_memory(bytes)?.to_rgba8();
        let corners = CornerSet::from_slice(corners)?;
        self.rectify(&source, &corners, size)
    }

    /// Rectify a decoded RGBA image.
    ///
    /// Returns [`Rectified::Unchanged`] when `corners` is exactly the image's
    /// own full frame. `size` overrides the computed output size.
    pub fn rectify(
        &self,
        source: &RgbaImage,
        corners: &CornerSet,
        size: Option<(u32, u32)>,
    ) -> Result<Rectified> {
        if !corners.is_finite() {
            return Err(ScanError::InvalidInput(
                "corner coordinates must be finite".to_string(),
            ));
        }

        let (src_w, src_h) = source.dimensions();
        if corners.is_full_frame(f64::from(src_w), f64::from(src_h)) {
            debug!("Full-frame selection on {}x{}, no transform needed", src_w, src_h);
            return Ok(Rectified::Unchanged);
        }

        let (out_w, out_h) = match size {
            Some((w, h)) if w > 0 && h > 0 => (w, h),
            Some((w, h)) => {
                return Err(ScanError::InvalidInput(format!(
                    "explicit output size {}x{} is empty",
                    w, h
                )))
            }
            None => self.output_size(corners)?,
        };

        let start = Instant::now();
        let target = CornerSet::full_frame(f64::from(out_w), f64::from(out_h));
        let projection = corner_projection(corners, &target)?;

        let mut output = RgbaImage::new(out_w, out_h);
        warp_into(
            source,
            &projection,
            Interpolation::Bilinear,
            Rgba([255, 255, 255, 255]),
            &mut output,
        );

        info!(
            "Rectified {}x{} selection to {}x{} in {:?}",
            src_w,
            src_h,
            out_w,
            out_h,
            start.elapsed()
        );

        Ok(Rectified::Warped(output))
    }
}
