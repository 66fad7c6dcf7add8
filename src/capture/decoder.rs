//! External decoder process producing a raw frame stream on stdout

use std::process::Stdio;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::{DecoderConfig, StreamConfig};

/// Arguments asking the decoder for an unbuffered raw stream of fixed-size frames.
pub fn decoder_args(stream: &StreamConfig) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-rtsp_transport".into(),
        stream.transport.clone(),
        "-fflags".into(),
        "nobuffer".into(),
        "-i".into(),
        stream.url.clone(),
        "-an".into(),
        "-f".into(),
        "image2pipe".into(),
        "-pix_fmt".into(),
        stream.pixel_format.ffmpeg_name().into(),
        "-vcodec".into(),
        "rawvideo".into(),
        "-s".into(),
        format!("{}x{}", stream.width, stream.height),
        "-".into(),
    ]
}

/// Running decoder child with its piped stdout
pub struct DecoderProcess {
    child: Child,
    stdout: ChildStdout,
}

impl DecoderProcess {
    /// Launch the decoder. Failing to start is fatal for ingestion.
    pub fn spawn(stream: &StreamConfig, decoder: &DecoderConfig) -> Result<Self> {
        info!("Starting {} for {}", decoder.program, stream.url);

        let mut child = Command::new(&decoder.program)
            .args(decoder_args(stream))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if decoder.show_log {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::decoder_startup(format!("{}: {}", decoder.program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::decoder_startup("decoder stdout was not captured"))?;

        debug!("Decoder running with pid {:?}", child.id());
        Ok(Self { child, stdout })
    }

    pub fn into_parts(self) -> (Child, ChildStdout) {
        (self.child, self.stdout)
    }
}

/// Splits a byte stream into frame-sized chunks
pub struct FrameReader<R> {
    inner: R,
    frame_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, frame_len: usize) -> Self {
        Self { inner, frame_len }
    }

    /// Read exactly one frame. A short read ends the stream with
    /// `DecoderStreamEnded`.
    pub async fn next_frame(&mut self) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(self.frame_len);
        let mut filled = 0;

        while filled < self.frame_len {
            match self.inner.read(&mut buf[filled..]).await {
                Ok(0) => return Err(AppError::DecoderStreamEnded { partial: filled }),
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Decoder output read failed: {}", e);
                    return Err(AppError::DecoderStreamEnded { partial: filled });
                }
            }
        }

        Ok(buf.freeze())
    }
}
