//! The capture session — orchestrates the live-crop pipeline.
//!
//! One session ties the pieces together:
//!
//! 1. A [`CaptureSource`] produces raw frames.
//! 2. The [`DragController`] publishes the selector position.
//! 3. The [`CropRenderer`] samples and JPEG-encodes the crop.
//! 4. A [`ViewerChannel`] carries the result to the surface.
//! 5. Optionally, a [`ScreenshotSink`] receives periodic autosaves.
//!
//! The render loop runs in a Tokio task on a fixed-rate interval with
//! skipped (never queued) missed ticks, so a slow tick is followed by
//! the next scheduled one rather than a burst. Sessions are
//! single-use: once stopped, a session cannot be restarted; start a
//! new one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Notify, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::drag::DragController;
use crate::error::CropError;
use crate::frame::EncodedFrame;
use crate::geometry::{CropRect, DisplayBounds, map_to_source};
use crate::render::CropRenderer;
use crate::sink::{SaveScreenshotRequest, ScreenshotSink};
use crate::source::CaptureSource;
use crate::viewer::ViewerChannel;

/// Default selector edge length in pixels.
pub const DEFAULT_CROP_SIZE: u32 = 512;
/// Default JPEG quality for rendered crops.
pub const DEFAULT_JPEG_QUALITY: u8 = 70;
/// Default render ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 30;

// ── SessionConfig ────────────────────────────────────────────────

/// Configuration for [`CaptureSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Selector edge length in pixels (the crop is always square).
    pub crop_size: u32,
    /// JPEG quality for rendered crops, 1..=100.
    pub jpeg_quality: u8,
    /// Render ticks per second.
    pub tick_rate: u32,
    /// How often the current crop is autosaved; `None` disables it.
    pub screenshot_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            crop_size: DEFAULT_CROP_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            tick_rate: DEFAULT_TICK_RATE,
            screenshot_interval: None,
        }
    }
}

impl SessionConfig {
    pub fn with_crop_size(mut self, size: u32) -> Self {
        self.crop_size = size.max(1);
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn with_tick_rate(mut self, rate: u32) -> Self {
        self.tick_rate = rate.clamp(1, 240);
        self
    }

    pub fn with_screenshot_interval(mut self, interval: Duration) -> Self {
        self.screenshot_interval = Some(interval);
        self
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

// ── SessionPhase ─────────────────────────────────────────────────

/// The lifecycle phase of a capture session.
///
/// ```text
///  Idle ──► Live ──► Stopped
/// ```
///
/// `Stopped` is terminal; sessions are single-use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Constructed but not yet sharing. Initial state.
    #[default]
    Idle,

    /// The render loop is (or may be) producing frames.
    Live {
        /// When the session went live.
        since: Instant,
    },

    /// Sharing has ended; the source is released. Terminal state.
    Stopped,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Live { .. } => write!(f, "Live"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

impl SessionPhase {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// How long the session has been live.
    ///
    /// Returns `None` for any other phase.
    pub fn live_duration(&self) -> Option<Duration> {
        match self {
            Self::Live { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Live`.
    ///
    /// Valid from: `Idle`.
    pub fn go_live(&mut self) -> Result<(), CropError> {
        match self {
            Self::Idle => {
                *self = Self::Live {
                    since: Instant::now(),
                };
                Ok(())
            }
            Self::Live { .. } => Err(CropError::InvalidTransition(
                "cannot go live: session is already live",
            )),
            Self::Stopped => Err(CropError::InvalidTransition(
                "cannot go live: session already stopped (sessions are single-use)",
            )),
        }
    }

    /// Transition to `Stopped`.
    ///
    /// Valid from: `Live`, `Stopped` (stopping twice is a no-op).
    pub fn finish(&mut self) -> Result<(), CropError> {
        match self {
            Self::Live { .. } | Self::Stopped => {
                *self = Self::Stopped;
                Ok(())
            }
            Self::Idle => Err(CropError::InvalidTransition(
                "cannot stop: session never went live",
            )),
        }
    }
}

// ── SessionStats ─────────────────────────────────────────────────

/// Counters for one session, published on a watch channel every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Render ticks the loop has woken for.
    pub ticks: u64,
    /// Frames delivered to the viewer surface.
    pub frames_sent: u64,
    /// Ticks skipped because the pipeline was not ready (no frame yet,
    /// zero resolution, degenerate bounds).
    pub skipped_ticks: u64,
    /// Frames that failed to encode.
    pub encode_failures: u64,
    /// Frames rendered but not delivered (surface closed or send failed).
    pub dropped_deliveries: u64,
    /// Autosaves handed to the screenshot sink.
    pub screenshots: u64,
}

// ── SessionHandle ────────────────────────────────────────────────

/// Cloneable handle for stopping and observing a running session from
/// other tasks.
#[derive(Clone)]
pub struct SessionHandle {
    running: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
    stats_rx: watch::Receiver<SessionStats>,
}

impl SessionHandle {
    /// Signal the session to stop. Idempotent; extra calls are no-ops.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.stop_notify.notify_one();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the latest published counters.
    pub fn stats(&self) -> SessionStats {
        *self.stats_rx.borrow()
    }

    /// Receiver yielding counters as the loop publishes them.
    pub fn stats_receiver(&self) -> watch::Receiver<SessionStats> {
        self.stats_rx.clone()
    }
}

// ── CaptureSession ───────────────────────────────────────────────

/// A live screen-share crop session.
///
/// # Lifetime
///
/// [`start`](Self::start) validates the collaborators and goes live;
/// [`run`](Self::run) drives the render loop until [`stop`](Self::stop)
/// (or a [`SessionHandle`]) signals it, or the source ends on its own.
/// Teardown releases the source and closes the viewer exactly once,
/// however many times stop is requested. Dropping an unstopped session
/// performs the same teardown, so the secondary surface is never
/// orphaned.
pub struct CaptureSession {
    source: Arc<dyn CaptureSource>,
    viewer: Arc<dyn ViewerChannel>,
    sink: Option<Arc<dyn ScreenshotSink>>,
    config: SessionConfig,
    phase: SessionPhase,
    renderer: CropRenderer,
    crop_rx: watch::Receiver<CropRect>,
    bounds_rx: watch::Receiver<DisplayBounds>,
    running: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
    warned_surface_closed: bool,
    stats: SessionStats,
    stats_tx: watch::Sender<SessionStats>,
    stats_rx: watch::Receiver<SessionStats>,
}

impl CaptureSession {
    /// Start a session over a live source and an open viewer channel.
    ///
    /// Fails with [`CropError::SourceUnavailable`] when the source is
    /// not live and [`CropError::ViewerUnreachable`] when the surface
    /// is already closed. On success the selector starts centered in
    /// the current bounds; the returned [`DragController`] moves it.
    pub fn start(
        source: Arc<dyn CaptureSource>,
        viewer: Arc<dyn ViewerChannel>,
        bounds_rx: watch::Receiver<DisplayBounds>,
        config: SessionConfig,
    ) -> Result<(Self, DragController), CropError> {
        if !source.is_live() {
            return Err(CropError::SourceUnavailable(
                "capture source is not live".into(),
            ));
        }
        if !viewer.is_open() {
            return Err(CropError::ViewerUnreachable(
                "surface closed before the session started".into(),
            ));
        }

        let controller = DragController::new(bounds_rx.clone(), config.crop_size as f64);
        let crop_rx = controller.subscribe();

        let mut phase = SessionPhase::default();
        phase.go_live()?;

        let renderer = CropRenderer::new(config.crop_size, config.jpeg_quality);
        let (stats_tx, stats_rx) = watch::channel(SessionStats::default());

        info!(
            "session live: {}px crop, quality {}, {} ticks/s",
            config.crop_size, config.jpeg_quality, config.tick_rate
        );

        let session = Self {
            source,
            viewer,
            sink: None,
            config,
            phase,
            renderer,
            crop_rx,
            bounds_rx,
            // Set before run() so a stop that lands in between is not lost.
            running: Arc::new(AtomicBool::new(true)),
            stop_notify: Arc::new(Notify::new()),
            warned_surface_closed: false,
            stats: SessionStats::default(),
            stats_tx,
            stats_rx,
        };
        Ok((session, controller))
    }

    /// Attach a screenshot sink for the periodic autosave.
    ///
    /// Has no effect unless the config carries a `screenshot_interval`.
    pub fn with_sink(mut self, sink: Arc<dyn ScreenshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Cloneable handle for stopping and observing this session.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            running: Arc::clone(&self.running),
            stop_notify: Arc::clone(&self.stop_notify),
            stats_rx: self.stats_rx.clone(),
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the render loop to stop. Idempotent.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.stop_notify.notify_one();
        }
    }

    /// Run the render loop until stopped or the source ends.
    ///
    /// Intended to be spawned on the Tokio runtime:
    ///
    /// ```no_run
    /// # use cropcast_core::session::CaptureSession;
    /// # async fn example(mut session: CaptureSession) {
    /// let handle = session.handle();
    /// tokio::spawn(async move { session.run().await });
    /// // … later …
    /// handle.stop();
    /// # }
    /// ```
    ///
    /// Returns the final counters. Per-tick failures (encode errors,
    /// failed deliveries) are counted and logged, never fatal.
    pub async fn run(&mut self) -> SessionStats {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut next_autosave = self.config.screenshot_interval.map(|i| Instant::now() + i);

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.stop_notify.notified() => continue,
            }
            // Re-check after every wakeup: a post-stop tick must never
            // touch a released source.
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            if !self.source.is_live() {
                info!("capture source ended; stopping session");
                break;
            }

            self.stats.ticks += 1;
            self.render_tick(&mut next_autosave);
            let _ = self.stats_tx.send(self.stats);
        }

        self.teardown();
        self.stats
    }

    /// One render pass: map the selector into video space, sample and
    /// encode the crop, deliver it, autosave when due.
    fn render_tick(&mut self, next_autosave: &mut Option<Instant>) {
        let crop = *self.crop_rx.borrow();
        // Bounds are re-read every tick — layout can change under us.
        let bounds = *self.bounds_rx.borrow();
        let native = self.source.native_resolution();

        let Some(src) = map_to_source(crop, bounds, native, self.config.crop_size as f64) else {
            self.stats.skipped_ticks += 1;
            return;
        };
        let Some(frame) = self.source.latest_frame() else {
            self.stats.skipped_ticks += 1;
            return;
        };

        let encoded = match self.renderer.render(&frame, src) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("frame encode failed: {e}");
                self.stats.encode_failures += 1;
                return;
            }
        };

        // A closed surface stops delivery, not capture: the crop keeps
        // rendering for the autosave until the user ends the session.
        if self.viewer.is_open() {
            match self.viewer.send(encoded.clone()) {
                Ok(()) => self.stats.frames_sent += 1,
                Err(e) => {
                    debug!("frame delivery failed: {e}");
                    self.stats.dropped_deliveries += 1;
                }
            }
        } else {
            if !self.warned_surface_closed {
                warn!("viewer surface closed; continuing capture without delivery");
                self.warned_surface_closed = true;
            }
            self.stats.dropped_deliveries += 1;
        }

        self.autosave(&encoded, next_autosave);
    }

    /// Hand the current crop to the sink when the interval has elapsed.
    /// Fire-and-forget: the save runs on its own task and a failure
    /// costs a log line, never a frame.
    fn autosave(&mut self, frame: &EncodedFrame, next_autosave: &mut Option<Instant>) {
        let Some(interval) = self.config.screenshot_interval else {
            return;
        };
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let Some(due) = next_autosave else {
            return;
        };
        if Instant::now() < *due {
            return;
        }
        *due = Instant::now() + interval;

        self.stats.screenshots += 1;
        let request = SaveScreenshotRequest::from_frame(frame);
        let sequence = frame.sequence;
        let sink = Arc::clone(sink);
        tokio::spawn(async move {
            let response = sink.save(request).await;
            if response.success {
                debug!(
                    "autosaved frame {sequence} as {}",
                    response.filename.unwrap_or_default()
                );
            } else {
                warn!(
                    "screenshot save failed: {}",
                    response.error.unwrap_or_default()
                );
            }
        });
    }

    /// Release the source, close the viewer, enter `Stopped`. Runs at
    /// most once; later calls are no-ops.
    fn teardown(&mut self) {
        if self.phase.is_stopped() {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        self.source.stop();
        self.viewer.close();
        if self.phase.finish().is_ok() {
            info!(
                "session stopped: {} ticks, {} frames delivered, {} skipped",
                self.stats.ticks, self.stats.frames_sent, self.stats.skipped_ticks
            );
        }
        let _ = self.stats_tx.send(self.stats);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ── Tests ────────────────────────────────────────────────────────
