//! Framing codec for [`ViewerMessage`]s over a byte stream.
//!
//! ## Wire format
//!
//! ```text
//! magic:     [u8; 4]  = "CPV1"
//! checksum:  u32      (first 4 bytes of blake3(payload), little-endian)
//! length:    u32      (payload byte count, little-endian)
//! payload:   [u8]     (bincode-serialized ViewerMessage)
//! ```
//!
//! The checksum covers the payload only. A frame that fails the magic
//! or checksum check is a protocol error: the connection is torn down
//! rather than resynchronized, since the surface link carries nothing
//! worth salvaging past a corrupt frame.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CropError;
use crate::viewer::ViewerMessage;

/// Leading bytes of every frame.
const MAGIC: [u8; 4] = *b"CPV1";

/// Fixed bytes before the payload: magic + checksum + length.
pub const HEADER_LEN: usize = 12;

/// Upper bound on a single serialized message. Generous for a padded
/// JPEG crop; anything larger means a desynchronized or hostile peer.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// First 4 bytes of the blake3 hash, as a little-endian u32.
fn payload_checksum(payload: &[u8]) -> u32 {
    let hash = blake3::hash(payload);
    let bytes = hash.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

// ── ViewerCodec ──────────────────────────────────────────────────

/// `tokio_util` codec framing [`ViewerMessage`]s for `Framed` I/O.
#[derive(Debug, Default)]
pub struct ViewerCodec;

impl ViewerCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ViewerCodec {
    type Item = ViewerMessage;
    type Error = CropError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        if src[0..4] != MAGIC {
            return Err(CropError::InvalidMagic);
        }

        let checksum = u32::from_le_bytes([src[4], src[5], src[6], src[7]]);
        let length = u32::from_le_bytes([src[8], src[9], src[10], src[11]]) as usize;

        if length > MAX_MESSAGE_SIZE {
            return Err(CropError::MessageTooLarge {
                size: length,
                max: MAX_MESSAGE_SIZE,
            });
        }

        if src.len() < HEADER_LEN + length {
            // Wait for the rest of the frame.
            src.reserve(HEADER_LEN + length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(length);

        if payload_checksum(&payload) != checksum {
            return Err(CropError::ChecksumMismatch);
        }

        ViewerMessage::from_bytes(&payload).map(Some)
    }
}

impl Encoder<ViewerMessage> for ViewerCodec {
    type Error = CropError;

    fn encode(&mut self, item: ViewerMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.to_bytes()?;

        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(CropError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        dst.reserve(HEADER_LEN + payload.len());
        dst.put_slice(&MAGIC);
        dst.put_u32_le(payload_checksum(&payload));
        dst.put_u32_le(payload.len() as u32);
        dst.put_slice(&payload);
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
