pub mod decoder;
pub mod frame;
pub mod ingest;

pub use decoder::{DecoderProcess, FrameReader};
pub use frame::PixelFormat;
pub use frame::RawFrame;
pub use ingest::{FrameIngestionPipeline, IngestSummary};
