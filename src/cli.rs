use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Grab stills from a live stream, stamped with network time
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Configuration file (defaults to ./framestamp.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Stream address handed to the decoder
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Time server queried for each capture
    #[arg(long)]
    pub ntp_server: Option<String>,

    /// Where each capture is written, overwriting the previous one
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Do not open captures in the system viewer
    #[arg(long)]
    pub no_viewer: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Flags given on the command line take precedence over every other layer.
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.stream.url = url.clone();
        }
        if let Some(width) = self.width {
            config.stream.width = width;
        }
        if let Some(height) = self.height {
            config.stream.height = height;
        }
        if let Some(server) = &self.ntp_server {
            config.clock.server = server.clone();
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if self.no_viewer {
            config.output.open_viewer = false;
        }
    }
}
