//! # cropcast-core
//!
//! Core library for the cropcast screen-share live-crop pipeline.
//!
//! A fixed-size selector is dragged over a shared video stream; the
//! region under it is cropped from the native-resolution frames,
//! JPEG-encoded, and delivered to an independently-lifecycled viewer
//! surface in real time, with an optional periodic screenshot autosave.
//!
//! This crate contains:
//! - **Geometry**: `CropRect`, `DisplayBounds`, `map_to_source` — the
//!   screen-space to video-space mapping
//! - **Drag**: `DragController` — the pointer state machine moving the
//!   selector, publishing positions on a watch channel
//! - **Frames**: `RawFrame`, `EncodedFrame` and data-URI conversions
//! - **Sources**: the `CaptureSource` seam plus `TestPatternSource`
//!   and `StaticSource`
//! - **Render**: `CropRenderer` — nearest-neighbor sampling + JPEG
//! - **Viewer**: the `ViewerChannel` seam, an in-process pair, and a
//!   framed-TCP `RemoteViewer` with its `ViewerCodec`
//! - **Session**: `CaptureSession` — the fixed-rate render loop and
//!   its lifecycle
//! - **Sink**: the `ScreenshotSink` seam for the autosave
//! - **Error**: `CropError` — typed, `thiserror`-based error hierarchy

pub mod drag;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod render;
pub mod session;
pub mod sink;
pub mod source;
pub mod viewer;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use drag::DragController;
pub use error::CropError;
pub use frame::{EncodedFrame, ImageFormat, PixelFormat, RawFrame};
pub use geometry::{CropRect, DisplayBounds, Point, Resolution, SourceRect, map_to_source};
pub use render::CropRenderer;
pub use session::{
    CaptureSession, DEFAULT_CROP_SIZE, DEFAULT_JPEG_QUALITY, DEFAULT_TICK_RATE, SessionConfig,
    SessionHandle, SessionPhase, SessionStats,
};
pub use sink::{
    DirectorySink, FrameNamer, MemorySink, SaveScreenshotRequest, SaveScreenshotResponse,
    ScreenshotSink,
};
pub use source::{CaptureSource, StaticSource, TestPatternSource};
pub use viewer::{
    LocalViewer, RemoteViewer, SurfaceSpec, ViewerChannel, ViewerCodec, ViewerMessage,
    ViewerScreen, local_pair,
};
