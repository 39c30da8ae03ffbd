//! Capture sources — the live stream behind the crop pipeline.
//!
//! [`CaptureSource`] is the seam between the session and whatever
//! produces frames. Real OS capture backends live in embedders; this
//! crate ships a synthetic [`TestPatternSource`] (animated frames on a
//! tokio task) and a [`StaticSource`] test double with hand-driven
//! liveness.
//!
//! Acquisition fails with [`CropError::PermissionDenied`] when the user
//! declines the capture prompt (embedder backends) or
//! [`CropError::SourceUnavailable`] when there is nothing to capture.
//! Once acquired, a source may still end outside the session's
//! control; the liveness flag flips false and the session tears down
//! instead of stalling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::error::CropError;
use crate::frame::{PixelFormat, RawFrame};
use crate::geometry::Resolution;

/// Internal frame rate of the synthetic pattern producer.
const PATTERN_FPS: u32 = 60;

// ── CaptureSource ────────────────────────────────────────────────

/// A live capture source.
///
/// All methods are cheap, non-blocking snapshots; the render loop
/// calls them every tick and must never wait on the producer.
pub trait CaptureSource: Send + Sync {
    /// Native pixel dimensions of the source.
    ///
    /// Derived from the latest frame, so this reads zero until the
    /// first frame has arrived; callers poll or wait and skip work
    /// while it is zero.
    fn native_resolution(&self) -> Resolution;

    /// False once the source has ended, by [`stop`](Self::stop) or
    /// externally (the user stopped sharing via the native UI).
    fn is_live(&self) -> bool;

    /// Snapshot of the newest raw frame, if any has been produced.
    fn latest_frame(&self) -> Option<RawFrame>;

    /// Release the source and stop producing frames. Idempotent.
    fn stop(&self);
}

// ── TestPatternSource ────────────────────────────────────────────

/// Synthetic capture source producing an animated test pattern.
///
/// A tokio task generates BGRA frames at a fixed internal rate and
/// publishes the newest one on a watch channel. An optional frame
/// limit ends the source from the producer side, simulating the user
/// stopping the share externally.
pub struct TestPatternSource {
    live: Arc<AtomicBool>,
    frame_rx: watch::Receiver<Option<RawFrame>>,
}

impl TestPatternSource {
    /// Start a pattern source at the given native resolution.
    pub fn new(width: u32, height: u32) -> Result<Self, CropError> {
        Self::spawn(width, height, None)
    }

    /// Start a pattern source that ends itself after `max_frames`
    /// frames, as if the user had stopped sharing.
    pub fn with_limit(width: u32, height: u32, max_frames: u64) -> Result<Self, CropError> {
        Self::spawn(width, height, Some(max_frames))
    }

    fn spawn(width: u32, height: u32, limit: Option<u64>) -> Result<Self, CropError> {
        if width == 0 || height == 0 {
            return Err(CropError::SourceUnavailable(format!(
                "cannot capture a {width}x{height} surface"
            )));
        }

        let live = Arc::new(AtomicBool::new(true));
        let (frame_tx, frame_rx) = watch::channel(None);

        let task_live = Arc::clone(&live);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs_f64(1.0 / PATTERN_FPS as f64));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut produced: u64 = 0;

            while task_live.load(Ordering::SeqCst) {
                interval.tick().await;
                if !task_live.load(Ordering::SeqCst) {
                    break;
                }
                // External end: the producer side terminates the stream.
                if limit.is_some_and(|max| produced >= max) {
                    task_live.store(false, Ordering::SeqCst);
                    break;
                }
                if frame_tx.send(Some(pattern_frame(width, height, produced))).is_err() {
                    // Every handle to the source is gone.
                    break;
                }
                produced += 1;
            }
        });

        Ok(Self { live, frame_rx })
    }

    /// Wait until the producer has published its first frame, at which
    /// point [`native_resolution`](CaptureSource::native_resolution)
    /// reads non-zero. Fails if the source ends first.
    pub async fn wait_first_frame(&self) -> Result<(), CropError> {
        let mut rx = self.frame_rx.clone();
        rx.wait_for(Option::is_some)
            .await
            .map(|_| ())
            .map_err(|_| CropError::SourceEnded)
    }
}

impl CaptureSource for TestPatternSource {
    fn native_resolution(&self) -> Resolution {
        self.frame_rx
            .borrow()
            .as_ref()
            .map(RawFrame::resolution)
            .unwrap_or(Resolution::ZERO)
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn latest_frame(&self) -> Option<RawFrame> {
        self.frame_rx.borrow().clone()
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl Drop for TestPatternSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One frame of the moving diagonal gradient. Deterministic in
/// `(x, y, n)` so tests can predict pixel values.
fn pattern_frame(width: u32, height: u32, n: u64) -> RawFrame {
    let shift = n * 4;
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height as u64 {
        for x in 0..width as u64 {
            let b = ((x + shift) % 256) as u8;
            let g = ((y + shift / 2) % 256) as u8;
            let r = (((x ^ y) + shift) % 256) as u8;
            data.extend_from_slice(&[b, g, r, 0xFF]);
        }
    }
    RawFrame::new(width, height, PixelFormat::Bgra8, data)
}

// ── StaticSource ─────────────────────────────────────────────────

/// Capture source holding a single fixed frame.
///
/// Liveness is driven by hand: [`end`](Self::end) simulates the stream
/// terminating externally, [`stop`](CaptureSource::stop) is the
/// session releasing it. The release counter lets lifecycle tests
/// assert that a double `stop` releases exactly once.
pub struct StaticSource {
    frame: RawFrame,
    live: AtomicBool,
    stopped: AtomicBool,
    releases: AtomicU64,
}

impl StaticSource {
    /// Wrap an existing frame.
    pub fn new(frame: RawFrame) -> Self {
        Self {
            frame,
            live: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            releases: AtomicU64::new(0),
        }
    }

    /// A source showing a solid-colour RGB frame.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self::new(RawFrame::new(width, height, PixelFormat::Rgb8, data))
    }

    /// End the stream from outside the session, as the native sharing
    /// UI would. Does not count as a release.
    pub fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    /// How many times `stop` has actually released the source.
    pub fn release_count(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }
}

impl CaptureSource for StaticSource {
    fn native_resolution(&self) -> Resolution {
        self.frame.resolution()
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn latest_frame(&self) -> Option<RawFrame> {
        Some(self.frame.clone())
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.live.store(false, Ordering::SeqCst);
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
