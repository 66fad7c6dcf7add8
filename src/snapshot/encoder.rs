use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::{debug, instrument};

use crate::capture::RawFrame;
use crate::error::Result;

/// Quality used when none is configured; favors size over fidelity
pub const DEFAULT_QUALITY: u8 = 85;

/// Compress a frame to JPEG.
#[instrument(skip(frame), fields(width = frame.width, height = frame.height))]
pub fn encode_jpeg(frame: &RawFrame, quality: u8) -> Result<Vec<u8>> {
    let rgb = frame.to_rgb();
    let mut jpeg = Vec::with_capacity(rgb.len() / 8);
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
        encoder.encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)?;
    }
    debug!("Encoded frame {} into {} bytes", frame.sequence, jpeg.len());
    Ok(jpeg)
}
