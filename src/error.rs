use thiserror::Error;

/// Errors raised by the capture pipeline.
///
/// `DecoderStreamEnded` and `FrameDecodeMalformed` never leave the ingestion
/// loop; `TimeSyncUnavailable` and `NoFrameAvailable` abort a single capture;
/// `DecoderStartupFailure` is fatal.
#[derive(Error, Debug)]
pub enum AppError {
    /// `partial` bytes of an incomplete trailing frame were dropped
    #[error("decoder stream ended")]
    DecoderStreamEnded { partial: usize },

    #[error("malformed frame: expected {expected} bytes, got {actual}")]
    FrameDecodeMalformed { expected: usize, actual: usize },

    #[error("time sync unavailable: {0}")]
    TimeSyncUnavailable(String),

    #[error("no frame available yet")]
    NoFrameAvailable,

    #[error("failed to start decoder: {0}")]
    DecoderStartupFailure(String),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn time_sync(msg: impl Into<String>) -> Self {
        AppError::TimeSyncUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AppError::Config(msg.into())
    }

    pub fn decoder_startup(msg: impl Into<String>) -> Self {
        AppError::DecoderStartupFailure(msg.into())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_build_matching_variants() {
        assert!(matches!(
            AppError::time_sync("timeout"),
            AppError::TimeSyncUnavailable(msg) if msg == "timeout"
        ));
        assert!(matches!(
            AppError::decoder_startup("ffmpeg missing"),
            AppError::DecoderStartupFailure(_)
        ));
    }

    #[test]
    fn malformed_frame_message_names_sizes() {
        let err = AppError::FrameDecodeMalformed {
            expected: 12,
            actual: 7,
        };
        assert_eq!(err.to_string(), "malformed frame: expected 12 bytes, got 7");
    }
}
