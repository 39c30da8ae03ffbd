//! Sharer service core logic.
//!
//! Wires the capture source, the remote viewer surface, and the
//! optional screenshot autosave into a single capture session and
//! drives it to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use cropcast_core::error::CropError;
use cropcast_core::geometry::DisplayBounds;
use cropcast_core::session::{CaptureSession, SessionStats};
use cropcast_core::sink::DirectorySink;
use cropcast_core::source::{CaptureSource, TestPatternSource};
use cropcast_core::viewer::{RemoteViewer, SurfaceSpec};

use crate::config::SharerConfig;

// ── SharerService ────────────────────────────────────────────────

/// The top-level sharer service.
///
/// Owns the synthetic capture source and the TCP link to the viewer
/// surface, and runs one capture session over them.
pub struct SharerService {
    config: SharerConfig,
    running: Arc<AtomicBool>,
}

impl SharerService {
    /// Create a new sharer service with the given config.
    pub fn new(config: SharerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task or a signal handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run one capture session to completion.
    ///
    /// 1. Starts the capture source and waits for its first frame.
    /// 2. Connects to the viewer surface and announces the crop size.
    /// 3. Starts the session, with the autosave sink when enabled.
    /// 4. Runs until stopped or the stream ends, returning the final
    ///    counters.
    pub async fn run(&self) -> Result<SessionStats, CropError> {
        self.running.store(true, Ordering::SeqCst);

        let session_config = self.config.to_session_config();

        // Capture source.
        let source = Arc::new(TestPatternSource::new(
            self.config.capture.width,
            self.config.capture.height,
        )?);
        source.wait_first_frame().await?;
        info!("capture source live at {}", source.native_resolution());

        // Viewer surface.
        let spec = SurfaceSpec::for_crop(session_config.crop_size);
        let address = &self.config.delivery.viewer_address;
        let viewer = Arc::new(RemoteViewer::connect(address, spec).await?);
        info!("viewer surface connected at {address}");

        // Session over the full display area.
        let bounds = DisplayBounds::new(
            0.0,
            0.0,
            self.config.capture.display_width,
            self.config.capture.display_height,
        );
        let (_bounds_tx, bounds_rx) = watch::channel(bounds);

        let (mut session, _controller) =
            CaptureSession::start(source, viewer, bounds_rx, session_config)?;

        if self.config.autosave.enabled {
            let dir = &self.config.autosave.directory;
            let sink = DirectorySink::create(dir).await?;
            info!("autosaving screenshots to {dir}/");
            session = session.with_sink(Arc::new(sink));
        }

        // Bridge the service stop flag into the session. Resolves on
        // its own once the session ends and `running` flips below.
        let handle = session.handle();
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            Self::wait_for_stop(&running).await;
            handle.stop();
        });

        let stats = session.run().await;

        self.running.store(false, Ordering::SeqCst);
        info!("sharer service stopped");
        Ok(stats)
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_creates_with_defaults() {
        let svc = SharerService::new(SharerConfig::default());
        assert!(!svc.is_running());
    }

    #[test]
    fn stop_handle_works() {
        let svc = SharerService::new(SharerConfig::default());
        let handle = svc.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(svc.is_running());
        svc.stop();
        assert!(!svc.is_running());
    }
}
