//! Pointer-drag state machine for the crop selector.
//!
//! ```text
//!            pointer_down inside selector
//!   Idle ───────────────────────────────────► Dragging
//!    ▲                                           │
//!    └───────────────────────────────────────────┘
//!                 pointer_up (anywhere)
//! ```
//!
//! The controller owns the crop position and publishes every change
//! through a `watch` channel; the render loop holds the receiving
//! end and always sees the latest value. Pointer-up is global: the
//! drag ends wherever the pointer is released, inside the selector,
//! outside it, or outside the viewport entirely.

use tokio::sync::watch;

use crate::geometry::{CropRect, DisplayBounds, Point};

// ── DragState ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Idle,
    /// Active drag. `grab` is the offset from the selector origin to
    /// the pointer at grab time, so the selector moves with the
    /// pointer instead of snapping its corner to it.
    Dragging { grab: Point },
}

// ── DragController ───────────────────────────────────────────────

/// Stateful controller for the on-screen crop selector.
///
/// Created by [`CaptureSession::start`](crate::session::CaptureSession::start)
/// with the selector centered in the current display bounds. Bounds
/// are re-read from the watch channel on every mutation (layout can
/// change between events) and every published position is clamped so
/// the selector never leaves the video area.
pub struct DragController {
    state: DragState,
    size: f64,
    crop_tx: watch::Sender<CropRect>,
    bounds_rx: watch::Receiver<DisplayBounds>,
}

impl DragController {
    /// Create a controller with the selector centered in the current
    /// bounds.
    pub fn new(bounds_rx: watch::Receiver<DisplayBounds>, size: f64) -> Self {
        let crop = CropRect::centered(*bounds_rx.borrow(), size);
        let (crop_tx, _) = watch::channel(crop);
        Self {
            state: DragState::Idle,
            size,
            crop_tx,
            bounds_rx,
        }
    }

    /// Receiver for the selector position; the render loop reads the
    /// latest value from this every tick.
    pub fn subscribe(&self) -> watch::Receiver<CropRect> {
        self.crop_tx.subscribe()
    }

    /// Current selector position.
    pub fn crop(&self) -> CropRect {
        *self.crop_tx.borrow()
    }

    /// Selector edge length in screen space.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Whether a drag is in progress.
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Pointer pressed at `p`. Starts a drag only when the press lands
    /// inside the selector; returns whether the drag started.
    pub fn pointer_down(&mut self, p: Point) -> bool {
        let crop = self.crop();
        if crop.contains(p, self.size) {
            self.state = DragState::Dragging {
                grab: Point::new(p.x - crop.x, p.y - crop.y),
            };
            true
        } else {
            false
        }
    }

    /// Pointer moved to `p`. Outside an active drag this is a no-op;
    /// during one, the selector follows the pointer minus the grab
    /// offset, clamped to the current bounds.
    pub fn pointer_move(&mut self, p: Point) {
        if let DragState::Dragging { grab } = self.state {
            let bounds = *self.bounds_rx.borrow();
            let next = CropRect::new(p.x - grab.x, p.y - grab.y).clamped(bounds, self.size);
            self.crop_tx.send_replace(next);
        }
    }

    /// Pointer released. Always returns to `Idle`, wherever the
    /// release happened.
    pub fn pointer_up(&mut self) {
        self.state = DragState::Idle;
    }

    /// Re-center the selector in the current bounds.
    pub fn recenter(&mut self) {
        let bounds = *self.bounds_rx.borrow();
        self.crop_tx
            .send_replace(CropRect::centered(bounds, self.size));
    }

    /// Re-clamp the selector after a layout change. Call when the
    /// display bounds shrink or move while no drag is active.
    pub fn clamp_to_bounds(&mut self) {
        let bounds = *self.bounds_rx.borrow();
        let clamped = self.crop().clamped(bounds, self.size);
        self.crop_tx.send_replace(clamped);
    }
}

// ── Tests ────────────────────────────────────────────────────────
