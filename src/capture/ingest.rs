//! Continuous ingestion of decoder output into the frame store

use std::sync::Arc;

use tokio::io::AsyncRead;
use tracing::{debug, error, info, instrument, warn};

use crate::capture::decoder::{DecoderProcess, FrameReader};
use crate::capture::frame::{PixelFormat, RawFrame};
use crate::error::{AppError, Result};
use crate::pipeline::FrameStore;
use crate::{DecoderConfig, StreamConfig};

/// Counts reported when ingestion stops
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub frames_published: u64,
    pub frames_rejected: u64,
}

/// Owns the decoder process and feeds its frames into a [`FrameStore`]
pub struct FrameIngestionPipeline {
    process: DecoderProcess,
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_len: usize,
}

impl FrameIngestionPipeline {
    pub fn spawn(stream: &StreamConfig, decoder: &DecoderConfig) -> Result<Self> {
        let process = DecoderProcess::spawn(stream, decoder)?;
        Ok(Self {
            process,
            width: stream.width,
            height: stream.height,
            format: stream.pixel_format,
            frame_len: crate::capture::frame::frame_len(
                stream.width,
                stream.height,
                stream.pixel_format,
            ),
        })
    }

    /// Run until the decoder's output ends.
    pub async fn run(self, store: Arc<FrameStore>) -> IngestSummary {
        let (mut child, stdout) = self.process.into_parts();
        let reader = FrameReader::new(stdout, self.frame_len);

        let summary = ingest(reader, self.width, self.height, self.format, &store).await;

        match child.try_wait() {
            Ok(Some(status)) => debug!("Decoder exited with {}", status),
            Ok(None) => {
                debug!("Decoder closed its output but is still running, stopping it");
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop decoder: {}", e);
                }
            }
            Err(e) => warn!("Failed to query decoder status: {}", e),
        }

        summary
    }
}

/// Publish every full frame from `reader` until the stream ends.
///
/// Malformed frames are logged and skipped; they never stop ingestion.
#[instrument(skip(reader, store))]
pub async fn ingest<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    width: u32,
    height: u32,
    format: PixelFormat,
    store: &FrameStore,
) -> IngestSummary {
    let mut summary = IngestSummary::default();
    let mut sequence = 0u64;

    loop {
        let chunk = match reader.next_frame().await {
            Ok(chunk) => chunk,
            Err(e) => {
                if let AppError::DecoderStreamEnded {
                    partial: dropped @ 1..,
                } = &e
                {
                    debug!("Dropped {} trailing bytes of an incomplete frame", dropped);
                }
                info!("{} after {} frames", e, summary.frames_published);
                break;
            }
        };

        sequence += 1;
        match RawFrame::new(chunk, width, height, format, sequence) {
            Ok(frame) => {
                store.publish(frame);
                summary.frames_published += 1;
                metrics::counter!("frames_published").increment(1);
            }
            Err(e) => {
                error!("Frame decode failed: {}", e);
                summary.frames_rejected += 1;
                metrics::counter!("frames_rejected").increment(1);
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_each_full_frame() {
        let store = FrameStore::new();
        let mut data = vec![0u8; 2 * 2 * 3];
        data.extend(vec![255u8; 2 * 2 * 3]);
        let reader = FrameReader::new(&data[..], 12);

        let summary = ingest(reader, 2, 2, PixelFormat::Bgr24, &store).await;

        assert_eq!(summary.frames_published, 2);
        assert_eq!(summary.frames_rejected, 0);
        assert_eq!(store.sequence_count(), 2);
        let latest = store.snapshot().unwrap();
        assert!(latest.data.iter().all(|&b| b == 255));
        assert_eq!(latest.sequence, 2);
    }

    #[tokio::test]
    async fn trailing_partial_frame_is_dropped() {
        let store = FrameStore::new();
        let data = vec![7u8; 12 + 5];
        let reader = FrameReader::new(&data[..], 12);

        let summary = ingest(reader, 2, 2, PixelFormat::Bgr24, &store).await;

        assert_eq!(summary.frames_published, 1);
        assert_eq!(store.sequence_count(), 1);
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let store = FrameStore::new();
        // Chunks sized for a 2x2 frame, interpreted against a 3x3 geometry
        let data = vec![1u8; 24];
        let reader = FrameReader::new(&data[..], 12);

        let summary = ingest(reader, 3, 3, PixelFormat::Bgr24, &store).await;

        assert_eq!(summary.frames_published, 0);
        assert_eq!(summary.frames_rejected, 2);
        assert!(store.snapshot().is_none());
        assert_eq!(store.sequence_count(), 0);
    }
}
