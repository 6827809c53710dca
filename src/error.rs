//! Error types for the scanning core

use thiserror::Error;

/// Errors surfaced by the scanning pipeline
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("perspective transform could not be solved for the given corners")]
    DegenerateTransform,

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("frame source error: {0}")]
    Source(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ScanError>;
