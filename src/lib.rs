//! Live stream frame grabber with network-synchronized capture timestamps

pub mod capture;
pub mod cli;
pub mod clock;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod snapshot;
pub mod utils;

use std::path::{Path, PathBuf};

use capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use capture::{FrameIngestionPipeline, RawFrame};
pub use clock::{AuthoritativeTimeClient, SntpAuthority, TimeAuthority, TimeSample};
pub use error::{AppError, Result};
pub use pipeline::{ActivityReporter, FrameStore};
pub use snapshot::{CaptureController, CaptureRecord, CaptureReport, CaptureState};

/// Prefix for environment overrides, e.g. `FRAMESTAMP__STREAM__URL`
pub const ENV_PREFIX: &str = "FRAMESTAMP";

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "framestamp.toml";

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub stream: StreamConfig,
    pub decoder: DecoderConfig,
    pub clock: ClockConfig,
    pub output: OutputConfig,
    pub input: InputConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub url: String,
    pub transport: String,
    /// Must match the decoder output exactly or frames misalign
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub program: String,
    /// Forward the decoder's stderr to ours
    pub show_log: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    pub server: String,
    pub timeout_ms: u64,
    /// Round trips slower than this are logged as untrustworthy
    pub max_round_trip_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub quality: u8,
    pub open_viewer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub quit_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub report_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream: StreamConfig {
                url: String::new(),
                transport: "udp".into(),
                width: 1920,
                height: 1080,
                pixel_format: PixelFormat::Bgr24,
            },
            decoder: DecoderConfig {
                program: "ffmpeg".into(),
                show_log: false,
            },
            clock: ClockConfig {
                server: "pool.ntp.org".into(),
                timeout_ms: 2000,
                max_round_trip_ms: 250.0,
            },
            output: OutputConfig {
                path: PathBuf::from("preview.jpg"),
                quality: snapshot::encoder::DEFAULT_QUALITY,
                open_viewer: true,
            },
            input: InputConfig {
                quit_key: "q".into(),
            },
            pipeline: PipelineConfig {
                report_interval_ms: 1000,
            },
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `FRAMESTAMP__*` variables.
    ///
    /// An explicit `path` must exist; otherwise `framestamp.toml` is read
    /// only if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                config::File::from(path).required(true)
            }
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stream.url.trim().is_empty() {
            return Err(AppError::config(
                "stream.url is empty; set it in the config file, FRAMESTAMP__STREAM__URL or --url",
            ));
        }
        if self.stream.width == 0 || self.stream.height == 0 {
            return Err(AppError::config(format!(
                "invalid frame size {}x{}",
                self.stream.width, self.stream.height
            )));
        }
        if !(1..=100).contains(&self.output.quality) {
            return Err(AppError::config(format!(
                "output.quality must be within 1..=100, got {}",
                self.output.quality
            )));
        }
        self.quit_key()?;
        Ok(())
    }

    /// The single character that ends the program.
    pub fn quit_key(&self) -> Result<char> {
        let mut chars = self.input.quit_key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(AppError::config(format!(
                "input.quit_key must be a single character, got {:?}",
                self.input.quit_key
            ))),
        }
    }
}
