//! Screenshot sink — where the periodic crop autosave goes.
//!
//! The session hands each autosaved crop to a [`ScreenshotSink`] as a
//! [`SaveScreenshotRequest`] carrying a base64 data URI, and gets back
//! a [`SaveScreenshotResponse`]. The shapes are the external sink
//! contract, so failures travel in the response body rather than as
//! transport errors. Saving is always fire-and-forget from the render
//! loop's point of view: a broken sink costs log lines, never frames.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CropError;
use crate::frame::{EncodedFrame, ImageFormat, decode_data_uri};

// ── Request / Response ───────────────────────────────────────────

/// Body of a screenshot save: `{ "image": "data:image/jpeg;base64,…" }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveScreenshotRequest {
    /// The crop to persist, as a base64 data URI.
    pub image: String,
}

impl SaveScreenshotRequest {
    /// Wrap an encoded frame for saving.
    pub fn from_frame(frame: &EncodedFrame) -> Self {
        Self {
            image: frame.to_data_uri(),
        }
    }

    /// Recover the image format and raw encoded bytes from the URI.
    pub fn decode(&self) -> Result<(ImageFormat, Vec<u8>), CropError> {
        decode_data_uri(&self.image)
    }

    pub fn to_json(&self) -> Result<String, CropError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CropError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Outcome of a save: `{ "success": …, "filename"?, "url"?, "error"? }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveScreenshotResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Where the saved frame can be retrieved, when the sink has a
    /// notion of location (a path, an object URL).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveScreenshotResponse {
    /// A successful save under `filename`.
    pub fn saved(filename: impl Into<String>) -> Self {
        Self {
            success: true,
            filename: Some(filename.into()),
            url: None,
            error: None,
        }
    }

    /// Attach a retrieval location to a successful save.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// A failed save; the reason travels in the body.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            filename: None,
            url: None,
            error: Some(error.into()),
        }
    }

    pub fn to_json(&self) -> Result<String, CropError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CropError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ── ScreenshotSink ───────────────────────────────────────────────

/// Destination for autosaved crops.
///
/// Implementations report failure through the response rather than an
/// error type; the session logs it and moves on.
#[async_trait]
pub trait ScreenshotSink: Send + Sync {
    async fn save(&self, request: SaveScreenshotRequest) -> SaveScreenshotResponse;
}

// ── FrameNamer ───────────────────────────────────────────────────

/// Collision-free filenames for saved frames.
///
/// A monotonic counter instead of a wall-clock timestamp: two saves
/// landing within the same clock tick would otherwise overwrite each
/// other.
#[derive(Debug, Default)]
pub struct FrameNamer {
    counter: AtomicU64,
}

impl FrameNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next filename, e.g. `screenshot_000017.jpg`.
    pub fn next(&self, format: ImageFormat) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("screenshot_{:06}.{}", n, format.extension())
    }
}

// ── MemorySink ───────────────────────────────────────────────────

/// In-memory sink for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    namer: FrameNamer,
    saved: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames saved so far.
    pub async fn count(&self) -> usize {
        self.saved.lock().await.len()
    }

    /// Filenames in save order.
    pub async fn filenames(&self) -> Vec<String> {
        self.saved
            .lock()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ScreenshotSink for MemorySink {
    async fn save(&self, request: SaveScreenshotRequest) -> SaveScreenshotResponse {
        match request.decode() {
            Ok((format, bytes)) => {
                let filename = self.namer.next(format);
                self.saved.lock().await.push((filename.clone(), bytes));
                SaveScreenshotResponse::saved(filename)
            }
            Err(e) => SaveScreenshotResponse::failure(e.to_string()),
        }
    }
}

// ── DirectorySink ────────────────────────────────────────────────

/// Sink writing each frame as a file under one directory.
pub struct DirectorySink {
    dir: PathBuf,
    namer: FrameNamer,
}

impl DirectorySink {
    /// Open the sink, creating the directory if needed.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self, CropError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            namer: FrameNamer::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ScreenshotSink for DirectorySink {
    async fn save(&self, request: SaveScreenshotRequest) -> SaveScreenshotResponse {
        let (format, bytes) = match request.decode() {
            Ok(decoded) => decoded,
            Err(e) => return SaveScreenshotResponse::failure(e.to_string()),
        };

        let filename = self.namer.next(format);
        let path = self.dir.join(&filename);
        match tokio::fs::write(&path, &bytes).await {
            Ok(()) => {
                debug!("screenshot saved: {} ({} bytes)", path.display(), bytes.len());
                SaveScreenshotResponse::saved(filename).with_url(path.display().to_string())
            }
            Err(e) => SaveScreenshotResponse::failure(format!("write {}: {e}", path.display())),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
