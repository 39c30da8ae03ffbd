//! Frame representations for the crop pipeline.
//!
//! [`RawFrame`] is the internal, uncompressed snapshot handed out by a
//! capture source. [`EncodedFrame`] is the serialisable wire type the
//! viewer channel carries: a fixed-size JPEG plus a sequence number.
//! Both sides of the boundary also speak base64 data URIs, the format
//! the screenshot sink expects.

use std::time::Instant;

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CropError;

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout for raw captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (typical OS capture).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }

    /// Byte offsets of the red, green, and blue channels within a pixel.
    pub const fn rgb_offsets(self) -> (usize, usize, usize) {
        match self {
            PixelFormat::Bgra8 => (2, 1, 0),
            PixelFormat::Rgba8 | PixelFormat::Rgb8 => (0, 1, 2),
        }
    }
}

// ── RawFrame ─────────────────────────────────────────────────────

/// A raw, uncompressed video frame snapshot.
///
/// The `data` buffer holds `height` rows of `stride` bytes each.
/// `stride` may exceed `width * bytes_per_pixel` when the producer
/// pads rows for alignment. `Bytes` keeps per-tick snapshots cheap:
/// cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row pitch in **bytes** (may exceed `width * bpp`).
    pub stride: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data — `stride * height` bytes.
    pub data: Bytes,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl RawFrame {
    /// Build a frame with a tight stride (`width * bpp`).
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel() as u32,
            format,
            data: data.into(),
            timestamp: Instant::now(),
        }
    }

    /// Build a frame with an explicit (padded) row pitch.
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            width,
            height,
            stride,
            format,
            data: data.into(),
            timestamp: Instant::now(),
        }
    }

    /// Native dimensions of this frame.
    pub fn resolution(&self) -> crate::geometry::Resolution {
        crate::geometry::Resolution::new(self.width, self.height)
    }

    /// Total byte size the raw bitmap occupies.
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Returns a row slice (including possible padding bytes).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize;
        let end = start + self.stride as usize;
        &self.data[start..end]
    }

    /// Returns the pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride as usize + x as usize * bpp;
        &self.data[offset..offset + bpp]
    }
}

// ── ImageFormat ──────────────────────────────────────────────────

/// Encoded image formats the pipeline produces or accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// JPEG — lossy, compact, what the live crop always emits.
    #[default]
    Jpeg,
    /// PNG — lossless; accepted on the sink side.
    Png,
}

impl ImageFormat {
    /// MIME type used inside data URIs.
    pub const fn mime(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    /// File extension for saved frames.
    pub const fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageFormat::Jpeg => write!(f, "jpeg"),
            ImageFormat::Png => write!(f, "png"),
        }
    }
}

// ── EncodedFrame ─────────────────────────────────────────────────

/// One rendered crop: a fixed-size encoded bitmap plus its delivery
/// order. Ephemeral, produced each tick and dropped after delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodedFrame {
    /// Sequential frame number (0-based, per session).
    pub sequence: u64,
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// Encoding of `data`.
    pub format: ImageFormat,
    /// Encoded image bytes.
    pub data: Vec<u8>,
}

impl EncodedFrame {
    /// Render this frame as a base64 data URI, the payload shape the
    /// screenshot sink accepts and a viewer surface can display
    /// directly.
    pub fn to_data_uri(&self) -> String {
        encode_data_uri(self.format, &self.data)
    }
}

// ── Data URIs ────────────────────────────────────────────────────

/// Encode image bytes as `data:<mime>;base64,<payload>`.
pub fn encode_data_uri(format: ImageFormat, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        format.mime(),
        general_purpose::STANDARD.encode(data)
    )
}

/// Decode a `data:image/...;base64,...` URI into its format and bytes.
pub fn decode_data_uri(uri: &str) -> Result<(ImageFormat, Vec<u8>), CropError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| CropError::InvalidPayload("missing data: scheme".into()))?;

    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| CropError::InvalidPayload("missing ;base64, marker".into()))?;

    let format = ImageFormat::from_mime(mime)
        .ok_or_else(|| CropError::InvalidPayload(format!("unsupported media type: {mime}")))?;

    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| CropError::InvalidPayload(format!("base64 decode: {e}")))?;

    Ok((format, bytes))
}

// ── Tests ────────────────────────────────────────────────────────
