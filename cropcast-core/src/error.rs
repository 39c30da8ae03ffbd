//! Domain-specific error types for the cropcast pipeline.
//!
//! All fallible operations return `Result<T, CropError>`.
//! No panics on invalid input; every error is typed and recoverable:
//! a running session degrades (skips the tick, drops the delivery)
//! rather than taking the process down.

use thiserror::Error;

/// The canonical error type for the cropcast pipeline.
#[derive(Debug, Error)]
pub enum CropError {
    // ── Capture Errors ───────────────────────────────────────────
    /// The user declined the capture prompt.
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),

    /// No screen or window could be acquired.
    #[error("capture source unavailable: {0}")]
    SourceUnavailable(String),

    /// The capture source ended outside the session's control
    /// (e.g. the user stopped sharing via the native UI).
    #[error("capture source ended")]
    SourceEnded,

    // ── Delivery Errors ──────────────────────────────────────────
    /// The viewer surface is closed or its channel has failed.
    /// Non-fatal: frames are dropped, capture continues.
    #[error("viewer surface unreachable: {0}")]
    ViewerUnreachable(String),

    // ── Render Errors ────────────────────────────────────────────
    /// A frame failed to encode. Non-fatal: the tick is dropped.
    #[error("frame encode failed: {0}")]
    EncodeFailure(String),

    // ── Lifecycle Errors ─────────────────────────────────────────
    /// A session phase transition that the lifecycle does not allow.
    #[error("invalid session transition: {0}")]
    InvalidTransition(&'static str),

    // ── Wire Errors ──────────────────────────────────────────────
    /// Received bytes that do not start with the viewer-channel magic.
    #[error("invalid magic bytes: expected CPV1")]
    InvalidMagic,

    /// A framed message failed checksum verification.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// A framed message exceeds the codec limit.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    // ── Payload Errors ───────────────────────────────────────────
    /// A data URI or request body could not be parsed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // ── Ambient Errors ───────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding of a serialized payload failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<Box<bincode::ErrorKind>> for CropError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        CropError::Encoding(e.to_string())
    }
}

impl From<serde_json::Error> for CropError {
    fn from(e: serde_json::Error) -> Self {
        CropError::Encoding(e.to_string())
    }
}

impl From<image::ImageError> for CropError {
    fn from(e: image::ImageError) -> Self {
        CropError::EncodeFailure(e.to_string())
    }
}
