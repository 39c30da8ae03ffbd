//! In-process viewer — a channel/surface pair joined by a watch
//! channel.
//!
//! [`LocalViewer`] is the sending half the session holds;
//! [`ViewerScreen`] is the surface half an embedding UI renders from.
//! The watch channel gives latest-wins delivery for free: the screen
//! only ever observes the newest frame, and anything it was too slow
//! to read is gone. Either side can close; the other notices through
//! the shared open flag (or, when the screen is dropped outright,
//! through the dead channel).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::error::CropError;
use crate::frame::EncodedFrame;
use crate::viewer::{SurfaceSpec, ViewerChannel};

/// Create a connected viewer/screen pair for `spec`.
pub fn local_pair(spec: SurfaceSpec) -> (LocalViewer, ViewerScreen) {
    let open = Arc::new(AtomicBool::new(true));
    let (frame_tx, frame_rx) = watch::channel(None);

    let viewer = LocalViewer {
        open: Arc::clone(&open),
        frame_tx,
    };
    let screen = ViewerScreen {
        open,
        frame_rx,
        spec,
    };
    (viewer, screen)
}

// ── LocalViewer ──────────────────────────────────────────────────

/// The sending half of an in-process viewer channel.
pub struct LocalViewer {
    open: Arc<AtomicBool>,
    frame_tx: watch::Sender<Option<EncodedFrame>>,
}

impl ViewerChannel for LocalViewer {
    fn send(&self, frame: EncodedFrame) -> Result<(), CropError> {
        if !self.is_open() {
            return Err(CropError::ViewerUnreachable("surface is closed".into()));
        }
        self.frame_tx.send_replace(Some(frame));
        Ok(())
    }

    fn is_open(&self) -> bool {
        // The screen being dropped (window closed by the user) shows up
        // as a dead channel even without an explicit close.
        self.open.load(Ordering::SeqCst) && !self.frame_tx.is_closed()
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

// ── ViewerScreen ─────────────────────────────────────────────────

/// The surface half: renders whatever it receives.
pub struct ViewerScreen {
    open: Arc<AtomicBool>,
    frame_rx: watch::Receiver<Option<EncodedFrame>>,
    spec: SurfaceSpec,
}

impl ViewerScreen {
    /// Sizing this surface was opened with.
    pub fn spec(&self) -> SurfaceSpec {
        self.spec
    }

    /// Whether the sharer side still considers the surface open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Snapshot of the newest delivered frame.
    pub fn latest(&self) -> Option<EncodedFrame> {
        self.frame_rx.borrow().clone()
    }

    /// Wait for the next frame. Fails once the sharer is gone and no
    /// further frame can ever arrive.
    pub async fn next_frame(&mut self) -> Result<EncodedFrame, CropError> {
        loop {
            self.frame_rx
                .changed()
                .await
                .map_err(|_| CropError::ViewerUnreachable("sharer is gone".into()))?;
            if let Some(frame) = self.frame_rx.borrow_and_update().clone() {
                return Ok(frame);
            }
        }
    }

    /// Close the surface, as the user closing the window would.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl Drop for ViewerScreen {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Tests ────────────────────────────────────────────────────────
