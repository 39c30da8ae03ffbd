//! Viewer channel — one-way frame delivery to the secondary surface.
//!
//! The viewer surface lives in its own window or process and can be
//! closed at any time, independent of the capture session. The channel
//! therefore has exactly three capabilities: `send` (fire-and-forget,
//! no acknowledgment, no backpressure), `is_open` (checked immediately
//! before each send), and `close`. The channel never queues; it always
//! carries the newest frame, and a slow surface silently loses the
//! older ones.
//!
//! # Wire Protocol
//!
//! ```text
//! Sharer ──[Hello(SurfaceSpec)]──────────────► Surface   (once, first)
//! Sharer ──[Frame(EncodedFrame)]─────────────► Surface   (repeated)
//! Sharer ──[Bye]─────────────────────────────► Surface   (clean close)
//! ```
//!
//! The surface sends nothing back. Frames arrive in send order; a
//! surface that disappears mid-stream is detected by the transport and
//! surfaces as `is_open() == false` on the sharer side.

use serde::{Deserialize, Serialize};

use crate::error::CropError;
use crate::frame::EncodedFrame;

mod codec;
mod local;
mod remote;

pub use codec::{HEADER_LEN, MAX_MESSAGE_SIZE, ViewerCodec};
pub use local::{LocalViewer, ViewerScreen, local_pair};
pub use remote::RemoteViewer;

/// Extra edge length the surface window adds around the crop bitmap.
pub const SURFACE_PADDING: u32 = 20;

// ── SurfaceSpec ──────────────────────────────────────────────────

/// Sizing announcement sent ahead of the first frame so the surface
/// can lay itself out before anything renders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SurfaceSpec {
    /// Edge length of the crop bitmap in pixels.
    pub crop_size: u32,
    /// Edge length of the surface window (crop plus padding).
    pub surface_size: u32,
}

impl SurfaceSpec {
    /// Sizing for a given crop size, padded window included.
    pub fn for_crop(crop_size: u32) -> Self {
        Self {
            crop_size,
            surface_size: crop_size + SURFACE_PADDING,
        }
    }
}

// ── ViewerMessage ────────────────────────────────────────────────

/// Everything the sharer ever says to a viewer surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ViewerMessage {
    /// Surface sizing, sent once before any frame.
    Hello(SurfaceSpec),
    /// One rendered crop.
    Frame(EncodedFrame),
    /// Clean end of the stream.
    Bye,
}

impl ViewerMessage {
    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CropError> {
        bincode::serialize(self).map_err(|e| CropError::Encoding(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CropError> {
        bincode::deserialize(bytes).map_err(|e| CropError::Encoding(e.to_string()))
    }
}

// ── ViewerChannel ────────────────────────────────────────────────

/// A handle to a viewer surface with its own open/close lifecycle.
///
/// `send` publishes the newest frame and returns immediately;
/// delivery is at-most-once and unacknowledged. Implementations flip
/// `is_open` to false as soon as they learn the surface is gone, by
/// whichever side closed it.
pub trait ViewerChannel: Send + Sync {
    /// Hand the newest frame to the surface. Replaces any frame the
    /// surface has not picked up yet.
    fn send(&self, frame: EncodedFrame) -> Result<(), CropError>;

    /// Whether the surface is still reachable. Check this immediately
    /// before each send; the surface may close between ticks.
    fn is_open(&self) -> bool;

    /// Close the channel from the sharer side. Idempotent.
    fn close(&self);
}

// ── Tests ────────────────────────────────────────────────────────
