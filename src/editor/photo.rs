//! Captured photos and the working list
//!
//! Each photo exclusively owns its image buffers. Replacing a rectified or
//! filtered image drops the previous buffer before the new one is stored.

use image::RgbaImage;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::capture::{default_corners, CapturedFrame};
use crate::error::Result;
use crate::vision::filters::{apply_filter, FilterKind};
use crate::vision::geometry::CornerSet;
use crate::vision::rectify::{PerspectiveRectifier, Rectified};

/// A captured photo with its selection and derived images
#[derive(Debug, Clone)]
pub struct PhotoItem {
    id: Uuid,
    raw: RgbaImage,
    rectified: Option<RgbaImage>,
    filter: FilterKind,
    filtered: Option<RgbaImage>,
    /// Selection in raw-image pixels
    corners: CornerSet,
}

impl PhotoItem {
    /// Wrap an image with an initial selection, without rectifying
    pub fn new(raw: RgbaImage, corners: CornerSet) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw,
            rectified: None,
            filter: FilterKind::Original,
            filtered: None,
            corners,
        }
    }

    /// Snapshot a frame and rectify it with the detected or default corners.
    ///
    /// A failed first rectification is not fatal: the photo keeps showing
    /// the raw frame and the user can fix the corners in the editor.
    pub fn capture(
        frame: &CapturedFrame,
        detected: Option<CornerSet>,
        rectifier: &PerspectiveRectifier,
    ) -> Result<Self> {
        let raw = frame.to_image()?;
        let corners = detected.unwrap_or_else(|| default_corners(frame.width, frame.height));
        let mut photo = Self::new(raw, corners);
        if let Err(e) = photo.rectify_with(corners, rectifier) {
            warn!("Initial rectification of photo {} failed: {}", photo.id, e);
        }
        Ok(photo)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn raw(&self) -> &RgbaImage {
        &self.raw
    }

    pub fn rectified(&self) -> Option<&RgbaImage> {
        self.rectified.as_ref()
    }

    pub fn filtered(&self) -> Option<&RgbaImage> {
        self.filtered.as_ref()
    }

    pub fn filter(&self) -> FilterKind {
        self.filter
    }

    pub fn corners(&self) -> CornerSet {
        self.corners
    }

    /// Image the filter is applied to: the rectified image, else the raw one
    pub fn base_image(&self) -> &RgbaImage {
        self.rectified.as_ref().unwrap_or(&self.raw)
    }

    /// Image to show or run OCR on
    pub fn display_image(&self) -> &RgbaImage {
        self.filtered.as_ref().unwrap_or_else(|| self.base_image())
    }

    /// Select a filter and regenerate the filtered image
    pub fn set_filter(&mut self, kind: FilterKind) {
        self.filter = kind;
        self.refresh_filtered();
    }

    /// Rectify the raw image with `corners` and commit them.
    ///
    /// On error nothing changes. A full-frame selection only commits the
    /// corners; the current rectified and filtered images are kept.
    pub fn rectify_with(&mut self, corners: CornerSet, rectifier: &PerspectiveRectifier) -> Result<()> {
        match rectifier.rectify(&self.raw, &corners, None)? {
            Rectified::Warped(img) => {
                self.rectified = Some(img);
                self.refresh_filtered();
                debug!("Photo {} rectified", self.id);
            }
            Rectified::Unchanged => {
                debug!("Photo {} full-frame selection, images kept", self.id);
            }
        }
        self.corners = corners;
        Ok(())
    }

    fn refresh_filtered(&mut self) {
        self.filtered = None;
        self.filtered = apply_filter(self.base_image(), self.filter);
    }
}

/// Ordered list of photos captured in the current session
#[derive(Debug, Clone, Default)]
pub struct PhotoList {
    items: Vec<PhotoItem>,
}

impl PhotoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, photo: PhotoItem) -> Uuid {
        let id = photo.id();
        self.items.push(photo);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<&PhotoItem> {
        self.items.iter().find(|p| p.id() == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut PhotoItem> {
        self.items.iter_mut().find(|p| p.id() == id)
    }

    /// Remove a photo, releasing its buffers when the returned value is dropped
    pub fn remove(&mut self, id: Uuid) -> Option<PhotoItem> {
        let index = self.items.iter().position(|p| p.id() == id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhotoItem> {
        self.items.iter()
    }
}
