use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::capture::RawFrame;
use crate::clock::{format_ms, TimeSample};

/// Everything produced by one capture, kept only until it is written out
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub pre: TimeSample,
    pub frame: RawFrame,
    pub encoded: Vec<u8>,
    pub post: TimeSample,
    /// Authoritative time from `pre` to `post`. May be negative if the
    /// authority's answers were inconsistent.
    pub elapsed_ms: i64,
}

impl CaptureRecord {
    pub fn new(pre: TimeSample, frame: RawFrame, encoded: Vec<u8>, post: TimeSample) -> Self {
        let elapsed_ms = post.millis_since(&pre);
        Self {
            pre,
            frame,
            encoded,
            post,
            elapsed_ms,
        }
    }

    pub fn report(&self, output: &Path) -> CaptureReport {
        CaptureReport {
            authoritative: self.post.authoritative,
            bytes: self.encoded.len(),
            elapsed_ms: self.elapsed_ms,
            output: output.to_path_buf(),
        }
    }
}

/// Completion line emitted after a capture is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReport {
    pub authoritative: DateTime<Utc>,
    pub bytes: usize,
    pub elapsed_ms: i64,
    pub output: PathBuf,
}

impl std::fmt::Display for CaptureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Atomic timestamp: {} | JPEG Size: {} bytes | Took: {} ms | {}",
            format_ms(self.authoritative),
            self.bytes,
            self.elapsed_ms,
            self.output.display()
        )
    }
}
