//! DocScan - document edge detection, rectification and tagging
//!
//! Finds a document's outline in camera frames, keeps the outline steady
//! across frames, warps the selected quadrilateral to a flat rectangle and
//! classifies recognized text into document categories.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod editor;
pub mod error;
pub mod shared;
pub mod storage;
pub mod vision;

pub use error::{Result, ScanError};
