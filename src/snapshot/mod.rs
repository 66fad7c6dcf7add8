//! On-demand capture of the newest frame with authoritative timestamps

pub mod controller;
pub mod encoder;
pub mod output;
pub mod record;

pub use controller::{CaptureController, CaptureOutcome, CaptureState};
pub use encoder::encode_jpeg;
pub use output::{NoViewer, SystemViewer, Viewer};
pub use record::{CaptureRecord, CaptureReport};
