//! OCR boundary
//!
//! Recognition itself is provided by an external engine; this module only
//! defines the shape of its output and the trait the tagging step calls.

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A recognized block of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    /// Bounding box (x, y, width, height)
    pub bounds: (u32, u32, u32, u32),
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
}

/// Output of one recognition call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    /// Full recognized text
    pub text: String,
    pub blocks: Vec<TextBlock>,
}

impl OcrOutput {
    /// Output with text only and no block geometry
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            blocks: Vec::new(),
        }
    }

    /// Blocks at or above `min_confidence`
    pub fn confident_blocks(&self, min_confidence: f32) -> impl Iterator<Item = &TextBlock> {
        self.blocks
            .iter()
            .filter(move |b| b.confidence >= min_confidence)
    }
}

/// Text recognition engine
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &RgbaImage) -> Result<OcrOutput>;
}

/// Engine that returns the same text for every image.
///
/// Used when the text is already known, e.g. read from a sidecar file.
#[derive(Debug, Clone, Default)]
pub struct FixedTextOcr {
    output: OcrOutput,
}

impl FixedTextOcr {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            output: OcrOutput::from_text(text),
        }
    }
}

#[async_trait]
impl OcrEngine for FixedTextOcr {
    async fn recognize(&self, _image: &RgbaImage) -> Result<OcrOutput> {
        Ok(self.output.clone())
    }
}
