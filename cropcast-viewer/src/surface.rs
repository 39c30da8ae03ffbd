//! Per-session surface state.
//!
//! Tracks the announced layout and the latest presented frame for one
//! sharer session, optionally mirroring each frame to a file so an
//! image viewer pointed at it shows the live crop.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use cropcast_core::frame::EncodedFrame;
use cropcast_core::viewer::SurfaceSpec;

// ── SurfaceState ─────────────────────────────────────────────────

/// Presentation state for a single sharer session.
///
/// Created fresh per connection and dropped when the sharer leaves,
/// so counters always describe one session.
pub struct SurfaceState {
    spec: Option<SurfaceSpec>,
    latest: Option<EncodedFrame>,
    frames: u64,
    bytes: u64,
    mirror: Option<PathBuf>,
}

impl SurfaceState {
    /// A fresh surface. When `mirror` is set, every presented frame
    /// is also written to that file, replacing the previous one.
    pub fn new(mirror: Option<PathBuf>) -> Self {
        Self {
            spec: None,
            latest: None,
            frames: 0,
            bytes: 0,
            mirror,
        }
    }

    /// Lay the surface out per the sharer's announcement.
    pub fn open(&mut self, spec: SurfaceSpec) {
        info!(
            "surface opened: {}px crop in a {}px window",
            spec.crop_size, spec.surface_size
        );
        self.spec = Some(spec);
    }

    /// Present one delivered frame.
    pub async fn present(&mut self, frame: EncodedFrame) {
        self.frames += 1;
        self.bytes += frame.data.len() as u64;
        debug!("frame {}: {} bytes", frame.sequence, frame.data.len());
        if self.frames % 100 == 0 {
            info!(
                "{} frames presented ({} KiB received)",
                self.frames,
                self.bytes / 1024
            );
        }

        if let Some(path) = &self.mirror {
            if let Err(e) = tokio::fs::write(path, &frame.data).await {
                warn!("mirror write to {} failed: {e}", path.display());
            }
        }

        self.latest = Some(frame);
    }

    /// The announced layout, once a Hello has arrived.
    pub fn spec(&self) -> Option<SurfaceSpec> {
        self.spec
    }

    /// The most recently presented frame.
    pub fn latest(&self) -> Option<&EncodedFrame> {
        self.latest.as_ref()
    }

    /// Frames presented this session.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Total encoded bytes received this session.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

// ── Tests ────────────────────────────────────────────────────────
