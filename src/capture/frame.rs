use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{AppError, Result};

/// A decoded frame of packed pixels.
///
/// The pixel data is immutable, so clones handed out by the frame store are
/// independent copies from the reader's point of view.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,

    /// Position of this frame in the decoder output
    pub sequence: u64,

    /// Local instant the frame finished decoding
    pub timestamp: Instant,
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Bgr24,
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr24 | PixelFormat::Rgb24 => 3,
        }
    }

    /// Name understood by ffmpeg's `-pix_fmt`
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            PixelFormat::Bgr24 => "bgr24",
            PixelFormat::Rgb24 => "rgb24",
        }
    }
}

/// Size in bytes of one packed frame.
pub fn frame_len(width: u32, height: u32, format: PixelFormat) -> usize {
    width as usize * height as usize * format.bytes_per_pixel()
}

impl RawFrame {
    /// Interpret a decoder chunk as a BGR24 frame of the given dimensions.
    pub fn from_bgr24(data: impl Into<Bytes>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        Self::new(data.into(), width, height, PixelFormat::Bgr24, sequence)
    }

    pub fn new(data: Bytes, width: u32, height: u32, format: PixelFormat, sequence: u64) -> Result<Self> {
        let expected = frame_len(width, height, format);
        if expected == 0 || data.len() != expected {
            return Err(AppError::FrameDecodeMalformed {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            data,
            width,
            height,
            format,
            sequence,
            timestamp: Instant::now(),
        })
    }

    /// A frame with every byte set to `value`.
    pub fn filled(width: u32, height: u32, value: u8, sequence: u64) -> Self {
        let data = vec![value; frame_len(width, height, PixelFormat::Bgr24)];
        Self {
            data: Bytes::from(data),
            width,
            height,
            format: PixelFormat::Bgr24,
            sequence,
            timestamp: Instant::now(),
        }
    }

    /// Pixel data reordered to RGB.
    pub fn to_rgb(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgb24 => self.data.to_vec(),
            PixelFormat::Bgr24 => {
                let mut rgb = Vec::with_capacity(self.data.len());
                for px in self.data.chunks_exact(3) {
                    rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                }
                rgb
            }
        }
    }
}
