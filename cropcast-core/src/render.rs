//! Fixed-size crop rendering — sample, convert, JPEG-encode.
//!
//! [`CropRenderer`] runs once per tick: it nearest-neighbor samples the
//! mapped source rectangle out of the latest raw frame into a square
//! RGB buffer and compresses it to JPEG. Sampling is stride-aware and
//! pads out-of-frame reads with black, so a source rectangle that
//! overshoots the native frame by a fraction of a pixel never panics.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, RgbImage};

use crate::error::CropError;
use crate::frame::{EncodedFrame, ImageFormat, RawFrame};
use crate::geometry::SourceRect;

// ── CropRenderer ─────────────────────────────────────────────────

/// Renders the selected region of a raw frame into a fixed-size
/// encoded bitmap, numbering frames as it goes.
///
/// One renderer per session. Not shared across tasks; the render loop
/// is single-flight, so `&mut self` is enough.
pub struct CropRenderer {
    size: u32,
    quality: u8,
    sequence: u64,
}

impl CropRenderer {
    /// `size` is the output edge length in pixels, `quality` the JPEG
    /// quality (1-100).
    pub fn new(size: u32, quality: u8) -> Self {
        Self {
            size,
            quality,
            sequence: 0,
        }
    }

    /// Output edge length in pixels.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Sequence number the next rendered frame will carry.
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// Sample `src` out of `frame` and encode it.
    ///
    /// The sequence number only advances when encoding succeeds, so a
    /// dropped tick leaves no gap in the delivered numbering.
    pub fn render(&mut self, frame: &RawFrame, src: SourceRect) -> Result<EncodedFrame, CropError> {
        let rgb = sample_region(frame, src, self.size);
        let data = jpeg_encode(&rgb, self.size, self.size, self.quality)?;

        let encoded = EncodedFrame {
            sequence: self.sequence,
            width: self.size,
            height: self.size,
            format: ImageFormat::Jpeg,
            data,
        };
        self.sequence += 1;
        Ok(encoded)
    }
}

// ── Sampling ─────────────────────────────────────────────────────

/// Nearest-neighbor sample `src` from `frame` into a `size`×`size` RGB
/// buffer. Reads outside the frame come back black.
fn sample_region(frame: &RawFrame, src: SourceRect, size: u32) -> Vec<u8> {
    let bpp = frame.format.bytes_per_pixel();
    let (r_off, g_off, b_off) = frame.format.rgb_offsets();
    let stride = frame.stride as usize;
    let data = &frame.data;

    let mut rgb = Vec::with_capacity((size * size * 3) as usize);
    for y in 0..size {
        let sy = src.y + y as f64 * src.height / size as f64;
        for x in 0..size {
            let sx = src.x + x as f64 * src.width / size as f64;
            if sx < 0.0 || sy < 0.0 || sx >= frame.width as f64 || sy >= frame.height as f64 {
                rgb.extend_from_slice(&[0, 0, 0]);
                continue;
            }
            let offset = sy as usize * stride + sx as usize * bpp;
            if offset + bpp <= data.len() {
                rgb.push(data[offset + r_off]);
                rgb.push(data[offset + g_off]);
                rgb.push(data[offset + b_off]);
            } else {
                rgb.extend_from_slice(&[0, 0, 0]);
            }
        }
    }
    rgb
}

/// JPEG encode an RGB buffer.
fn jpeg_encode(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, CropError> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);

    let img: RgbImage = ImageBuffer::from_raw(width, height, rgb.to_vec())
        .ok_or_else(|| CropError::EncodeFailure("buffer does not match dimensions".into()))?;

    img.write_with_encoder(encoder)?;
    Ok(buf.into_inner())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    /// 4x4 BGRA frame split into four 2x2 solid quadrants:
    /// red | green on top, blue | white below.
    fn quadrant_frame() -> RawFrame {
        let red = [0u8, 0, 255, 255];
        let green = [0u8, 255, 0, 255];
        let blue = [255u8, 0, 0, 255];
        let white = [255u8, 255, 255, 255];
        let mut data = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                let px = match (x < 2, y < 2) {
                    (true, true) => red,
                    (false, true) => green,
                    (true, false) => blue,
                    (false, false) => white,
                };
                data.extend_from_slice(&px);
            }
        }
        RawFrame::new(4, 4, PixelFormat::Bgra8, data)
    }

    fn rect(x: f64, y: f64, width: f64, height: f64) -> SourceRect {
        SourceRect {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn samples_the_requested_quadrant() {
        let frame = quadrant_frame();

        // Top-left quadrant upscaled to 4x4 — all red in RGB order.
        let rgb = sample_region(&frame, rect(0.0, 0.0, 2.0, 2.0), 4);
        assert_eq!(rgb.len(), 48);
        assert!(rgb.chunks(3).all(|px| px == [255, 0, 0]));

        // Bottom-right quadrant: all white.
        let rgb = sample_region(&frame, rect(2.0, 2.0, 2.0, 2.0), 2);
        assert!(rgb.chunks(3).all(|px| px == [255, 255, 255]));
    }

    #[test]
    fn converts_bgra_channel_order() {
        let frame = RawFrame::new(1, 1, PixelFormat::Bgra8, vec![10u8, 20, 30, 255]);
        let rgb = sample_region(&frame, rect(0.0, 0.0, 1.0, 1.0), 1);
        assert_eq!(rgb, vec![30, 20, 10]);
    }

    #[test]
    fn respects_row_stride_padding() {
        // 2x2 RGB with 2 bytes of padding per row.
        let data = vec![
            1, 2, 3, 4, 5, 6, 0, 0, // row 0 + pad
            7, 8, 9, 10, 11, 12, 0, 0, // row 1 + pad
        ];
        let frame = RawFrame::with_stride(2, 2, 8, PixelFormat::Rgb8, data);
        let rgb = sample_region(&frame, rect(0.0, 1.0, 2.0, 1.0), 2);
        assert_eq!(rgb, vec![7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn out_of_frame_reads_are_black() {
        let frame = RawFrame::new(2, 2, PixelFormat::Rgb8, vec![200u8; 12]);

        // Rectangle hanging past the right/bottom edge.
        let rgb = sample_region(&frame, rect(1.0, 1.0, 4.0, 4.0), 4);
        // Only the first sample lands inside the frame.
        assert_eq!(&rgb[0..3], &[200, 200, 200]);
        assert!(rgb[3..].chunks(3).all(|px| px == [0, 0, 0]));

        // Entirely negative rectangle.
        let rgb = sample_region(&frame, rect(-10.0, -10.0, 4.0, 4.0), 2);
        assert!(rgb.chunks(3).all(|px| px == [0, 0, 0]));
    }

    #[test]
    fn render_produces_jpeg_with_sequence() {
        let frame = quadrant_frame();
        let mut renderer = CropRenderer::new(16, 70);

        let first = renderer.render(&frame, rect(0.0, 0.0, 4.0, 4.0)).unwrap();
        let second = renderer.render(&frame, rect(0.0, 0.0, 4.0, 4.0)).unwrap();

        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(first.width, 16);
        assert_eq!(first.height, 16);
        assert_eq!(first.format, ImageFormat::Jpeg);
        // JPEG SOI / EOI markers.
        assert_eq!(&first.data[0..2], &[0xFF, 0xD8]);
        assert_eq!(&first.data[first.data.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn quality_changes_payload_size() {
        // A noisy frame so quality has something to trade away.
        let mut data = Vec::new();
        for y in 0u32..64 {
            for x in 0u32..64 {
                data.extend_from_slice(&[(x * 37 % 256) as u8, (y * 91 % 256) as u8, ((x ^ y) % 256) as u8]);
            }
        }
        let frame = RawFrame::new(64, 64, PixelFormat::Rgb8, data);
        let src = rect(0.0, 0.0, 64.0, 64.0);

        let low = CropRenderer::new(64, 10).render(&frame, src).unwrap();
        let high = CropRenderer::new(64, 95).render(&frame, src).unwrap();
        assert!(high.data.len() > low.data.len());
    }

    #[test]
    fn fractional_source_rect_renders() {
        let frame = quadrant_frame();
        let mut renderer = CropRenderer::new(8, 70);
        // Non-integral rect, as real display-to-native scales produce.
        let encoded = renderer.render(&frame, rect(0.5, 0.5, 2.5, 2.5)).unwrap();
        assert_eq!(encoded.width, 8);
        assert!(!encoded.data.is_empty());
    }
}
