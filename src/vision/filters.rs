//! Photo filters applied to rectified scans
//!
//! All filters work on RGB and leave alpha untouched.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

use crate::error::ScanError;

const ENHANCE_CONTRAST: f32 = 1.2;
const SCAN_CONTRAST: f32 = 1.8;
const SCAN_THRESHOLD: f32 = 100.0;
const SHADOW_LEVEL: u8 = 100;
const SHADOW_TARGET: f32 = 128.0;
const SHADOW_LIFT: f32 = 0.5;
const SHADOW_RADIUS: u32 = 3;

/// Available photo filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    Original,
    Enhance,
    Sharpen,
    Mono,
    Scan,
    RemoveShadow,
}

impl FilterKind {
    pub const ALL: [FilterKind; 6] = [
        FilterKind::Original,
        FilterKind::Enhance,
        FilterKind::Sharpen,
        FilterKind::Mono,
        FilterKind::Scan,
        FilterKind::RemoveShadow,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            FilterKind::Original => "original",
            FilterKind::Enhance => "enhance",
            FilterKind::Sharpen => "sharpen",
            FilterKind::Mono => "mono",
            FilterKind::Scan => "scan",
            FilterKind::RemoveShadow => "remove_shadow",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for FilterKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" | "none" => Ok(FilterKind::Original),
            "enhance" => Ok(FilterKind::Enhance),
            "sharpen" | "sharpening" => Ok(FilterKind::Sharpen),
            "mono" => Ok(FilterKind::Mono),
            "scan" => Ok(FilterKind::Scan),
            "remove_shadow" | "remove-shadow" | "remshad" => Ok(FilterKind::RemoveShadow),
            other => Err(ScanError::InvalidInput(format!("unknown filter '{}'", other))),
        }
    }
}

/// Apply `kind` to `source`.
///
/// Returns `None` for [`FilterKind::Original`]; the caller shows the
/// unfiltered image in that case.
pub fn apply_filter(source: &RgbaImage, kind: FilterKind) -> Option<RgbaImage> {
    let start = Instant::now();
    let result = match kind {
        FilterKind::Original => return None,
        FilterKind::Enhance => {
            let mut img = source.clone();
            apply_contrast(&mut img, ENHANCE_CONTRAST);
            img
        }
        FilterKind::Sharpen => apply_sharpen(source),
        FilterKind::Mono => {
            let mut img = source.clone();
            apply_grayscale(&mut img);
            img
        }
        FilterKind::Scan => {
            let mut img = source.clone();
            apply_scan(&mut img);
            img
        }
        FilterKind::RemoveShadow => apply_remove_shadow(source),
    };

    debug!(
        "Applied {} filter to {}x{} in {:?}",
        kind,
        source.width(),
        source.height(),
        start.elapsed()
    );
    Some(result)
}

fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

fn to_channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Contrast around the midpoint (128)
fn apply_contrast(img: &mut RgbaImage, factor: f32) {
    for chunk in img.chunks_exact_mut(4) {
        for c in chunk.iter_mut().take(3) {
            *c = to_channel((*c as f32 - 128.0) * factor + 128.0);
        }
    }
}

fn apply_grayscale(img: &mut RgbaImage) {
    for chunk in img.chunks_exact_mut(4) {
        let gray = to_channel(luma(chunk[0], chunk[1], chunk[2]));
        chunk[0] = gray;
        chunk[1] = gray;
        chunk[2] = gray;
    }
}

/// Grayscale, strong contrast, then binarize
fn apply_scan(img: &mut RgbaImage) {
    for chunk in img.chunks_exact_mut(4) {
        let gray = luma(chunk[0], chunk[1], chunk[2]);
        let contrasted = ((gray - 128.0) * SCAN_CONTRAST + 128.0).clamp(0.0, 255.0);
        let value = if contrasted > SCAN_THRESHOLD { 255 } else { 0 };
        chunk[0] = value;
        chunk[1] = value;
        chunk[2] = value;
    }
}

/// 3x3 sharpen kernel `[0,-1,0; -1,5,-1; 0,-1,0]`, interior pixels only
fn apply_sharpen(source: &RgbaImage) -> RgbaImage {
    let (w, h) = source.dimensions();
    let mut result = source.clone();
    if w < 3 || h < 3 {
        return result;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = source.get_pixel(x, y).0;
            let top = source.get_pixel(x, y - 1).0;
            let bottom = source.get_pixel(x, y + 1).0;
            let left = source.get_pixel(x - 1, y).0;
            let right = source.get_pixel(x + 1, y).0;

            let out = result.get_pixel_mut(x, y);
            for c in 0..3 {
                let sum = 5 * center[c] as i32
                    - top[c] as i32
                    - bottom[c] as i32
                    - left[c] as i32
                    - right[c] as i32;
                out.0[c] = sum.clamp(0, 255) as u8;
            }
        }
    }
    result
}

/// Lift dark pixels toward mid-gray using the local per-channel minimum
fn apply_remove_shadow(source: &RgbaImage) -> RgbaImage {
    let (w, h) = source.dimensions();
    let mut result = source.clone();

    for y in 0..h {
        for x in 0..w {
            let px = source.get_pixel(x, y).0;
            if px[..3].iter().all(|&c| c >= SHADOW_LEVEL) {
                continue;
            }

            let mut local_min = [255u8; 3];
            let x0 = x.saturating_sub(SHADOW_RADIUS);
            let y0 = y.saturating_sub(SHADOW_RADIUS);
            let x1 = (x + SHADOW_RADIUS).min(w - 1);
            let y1 = (y + SHADOW_RADIUS).min(h - 1);
            for ny in y0..=y1 {
                for nx in x0..=x1 {
                    let n = source.get_pixel(nx, ny).0;
                    for c in 0..3 {
                        local_min[c] = local_min[c].min(n[c]);
                    }
                }
            }

            let out = result.get_pixel_mut(x, y);
            for c in 0..3 {
                let lift = (SHADOW_TARGET - local_min[c] as f32) * SHADOW_LIFT;
                out.0[c] = to_channel(px[c] as f32 + lift);
            }
        }
    }
    result
}
