//! Screen-space and video-space geometry.
//!
//! Screen space is the coordinate system of the page that renders the
//! shared video (f64, CSS-pixel style). Video space is the native
//! pixel grid of the captured source. [`map_to_source`] translates
//! between the two and is the only place scaling happens; it is pure
//! and recomputes the scale on every call, because the display layout
//! can change between ticks.

// ── Point ────────────────────────────────────────────────────────

/// A position in screen space (pointer coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ── DisplayBounds ────────────────────────────────────────────────

/// The on-screen rectangle the captured video is rendered into.
///
/// Read fresh on every tick and every drag event, never cached,
/// since the surrounding layout can move or resize the video element
/// at any time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayBounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the rectangle has no renderable area.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

// ── CropRect ─────────────────────────────────────────────────────

/// Screen-space position of the fixed-size crop selector.
///
/// Only the origin is stored; the selector size is a session
/// parameter and travels alongside. Every mutation goes through
/// [`clamped`](Self::clamped) so the selector never leaves the
/// display bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
}

impl CropRect {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The selector centered within `bounds`, clamped.
    pub fn centered(bounds: DisplayBounds, size: f64) -> Self {
        Self {
            x: bounds.x + (bounds.width - size) / 2.0,
            y: bounds.y + (bounds.height - size) / 2.0,
        }
        .clamped(bounds, size)
    }

    /// Clamp the selector origin so a `size`×`size` box stays inside
    /// `bounds`. When the bounds are smaller than the selector the
    /// origin pins to the bounds origin.
    pub fn clamped(self, bounds: DisplayBounds, size: f64) -> Self {
        let max_x = (bounds.x + bounds.width - size).max(bounds.x);
        let max_y = (bounds.y + bounds.height - size).max(bounds.y);
        Self {
            x: self.x.clamp(bounds.x, max_x),
            y: self.y.clamp(bounds.y, max_y),
        }
    }

    /// Hit test: is `p` inside the `size`×`size` selector?
    pub fn contains(&self, p: Point, size: f64) -> bool {
        p.x >= self.x && p.x <= self.x + size && p.y >= self.y && p.y <= self.y + size
    }
}

// ── Resolution ───────────────────────────────────────────────────

/// Native pixel dimensions of the captured source.
///
/// Zero until the source has produced its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const ZERO: Resolution = Resolution {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True while the source has not reported its dimensions yet.
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── SourceRect ───────────────────────────────────────────────────

/// A rectangle in video space: the region of the native frame the
/// renderer samples. Fractional, since the display-to-native scale is
/// rarely integral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

// ── Mapper ───────────────────────────────────────────────────────

/// Map the screen-space crop selector into video space.
///
/// Returns `None` when the source is not ready (zero native
/// resolution) or the display bounds are degenerate; the caller skips
/// the render tick in that case.
pub fn map_to_source(
    crop: CropRect,
    bounds: DisplayBounds,
    native: Resolution,
    size: f64,
) -> Option<SourceRect> {
    if native.is_zero() || bounds.is_degenerate() {
        return None;
    }

    let scale_x = native.width as f64 / bounds.width;
    let scale_y = native.height as f64 / bounds.height;

    Some(SourceRect {
        x: (crop.x - bounds.x) * scale_x,
        y: (crop.y - bounds.y) * scale_y,
        width: size * scale_x,
        height: size * scale_y,
    })
}

// ── Tests ────────────────────────────────────────────────────────
