//! Photo editing
//!
//! Captured photos, their derived images, and the corner editor used to
//! correct a selection before re-rectifying.

pub mod corners;
pub mod photo;

pub use corners::{CornerEditor, DisplayMapping, DragMode, DragSession, EditorConfig, MidpointHandle};
pub use photo::{PhotoItem, PhotoList};
