//! TCP-backed viewer channel — the surface runs in another process.
//!
//! The stream is split into a writer task that forwards the newest
//! frame and a reader task whose only job is noticing the peer go
//! away. Frames pass from `send` to the writer through a watch
//! channel, so delivery is latest-wins end to end: a surface that
//! stalls behind a slow link gets the current frame when it catches
//! up, not a backlog.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, watch};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::error::CropError;
use crate::frame::EncodedFrame;
use crate::viewer::{SurfaceSpec, ViewerChannel, ViewerCodec, ViewerMessage};

// ── RemoteViewer ─────────────────────────────────────────────────

/// Viewer channel over a framed TCP connection.
pub struct RemoteViewer {
    /// False once the peer is known to be gone.
    open: Arc<AtomicBool>,
    /// True once `close` has been called on this side.
    closing: Arc<AtomicBool>,
    closed: Arc<Notify>,
    frame_tx: watch::Sender<Option<EncodedFrame>>,
}

impl RemoteViewer {
    /// Connect to a viewer surface at `addr` and announce `spec`.
    ///
    /// Fails with [`CropError::ViewerUnreachable`] when the surface
    /// process cannot be reached.
    pub async fn connect(addr: &str, spec: SurfaceSpec) -> Result<Self, CropError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| CropError::ViewerUnreachable(format!("connect {addr}: {e}")))?;
        Self::from_stream(stream, spec).await
    }

    /// Wrap an established connection. The Hello is sent before this
    /// returns, so a surface that hangs up immediately fails here.
    pub async fn from_stream(stream: TcpStream, spec: SurfaceSpec) -> Result<Self, CropError> {
        let (mut sink, mut source) = Framed::new(stream, ViewerCodec::new()).split();

        sink.send(ViewerMessage::Hello(spec))
            .await
            .map_err(|e| CropError::ViewerUnreachable(format!("hello rejected: {e}")))?;

        let open = Arc::new(AtomicBool::new(true));
        let closing = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(Notify::new());
        let (frame_tx, mut frame_rx) = watch::channel(None::<EncodedFrame>);

        // Reader: the surface sends nothing, so anything other than a
        // clean Bye means the link is gone.
        let reader_open = Arc::clone(&open);
        tokio::spawn(async move {
            while let Some(result) = source.next().await {
                match result {
                    Ok(ViewerMessage::Bye) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("viewer link read error: {e}");
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            debug!("viewer surface link closed");
        });

        // Writer: forward the newest frame; on close, a final Bye.
        let writer_open = Arc::clone(&open);
        let writer_closing = Arc::clone(&closing);
        let writer_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            loop {
                // Flag before wait: a close that lands mid-send is
                // picked up on the next pass instead of being lost.
                if writer_closing.load(Ordering::SeqCst) {
                    let _ = sink.send(ViewerMessage::Bye).await;
                    let _ = sink.close().await;
                    break;
                }
                tokio::select! {
                    _ = writer_closed.notified() => {}
                    changed = frame_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let frame = frame_rx.borrow_and_update().clone();
                        if let Some(frame) = frame {
                            if let Err(e) = sink.send(ViewerMessage::Frame(frame)).await {
                                debug!("viewer link write error: {e}");
                                writer_open.store(false, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Self {
            open,
            closing,
            closed,
            frame_tx,
        })
    }
}

impl ViewerChannel for RemoteViewer {
    fn send(&self, frame: EncodedFrame) -> Result<(), CropError> {
        if !self.is_open() {
            return Err(CropError::ViewerUnreachable("surface is closed".into()));
        }
        self.frame_tx.send_replace(Some(frame));
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.closing.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if !self.closing.swap(true, Ordering::SeqCst) {
            self.closed.notify_waiters();
        }
    }
}

impl Drop for RemoteViewer {
    fn drop(&mut self) {
        // The surface must not be orphaned mid-stream.
        self.close();
    }
}

// ── Tests ────────────────────────────────────────────────────────
