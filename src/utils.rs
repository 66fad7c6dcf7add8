use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, info};

use crate::error::{AppError, Result};

/// Make sure the decoder binary can be launched before starting the pipeline
pub fn check_decoder(program: &str) -> Result<()> {
    let status = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| AppError::decoder_startup(format!("{} not found: {}", program, e)))?;

    if !status.success() {
        return Err(AppError::decoder_startup(format!(
            "{} -version exited with {}",
            program, status
        )));
    }

    info!("Found decoder: {}", program);
    Ok(())
}

/// Command that opens a file in the platform's default viewer
pub fn viewer_command(path: &Path) -> Command {
    if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}

/// Fire-and-forget: the exit status is never checked.
pub fn open_in_viewer(path: &Path) {
    let spawned = viewer_command(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match spawned {
        Ok(mut child) => {
            // Reap in the background so no zombie is left behind
            let _ = thread::Builder::new()
                .name("viewer-reaper".into())
                .spawn(move || {
                    let _ = child.wait();
                });
        }
        Err(e) => debug!("Failed to open viewer for {}: {}", path.display(), e),
    }
}

/// Writes `\n` as `\r\n` when enabled.
///
/// Raw terminal mode turns off output post-processing, so a bare newline
/// would leave the cursor in the current column.
pub struct CrlfWriter<W> {
    inner: W,
    translate: bool,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W, translate: bool) -> Self {
        Self { inner, translate }
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.translate {
            return self.inner.write(buf);
        }

        let mut start = 0;
        for (i, _) in buf.iter().enumerate().filter(|&(_, &b)| b == b'\n') {
            self.inner.write_all(&buf[start..i])?;
            self.inner.write_all(b"\r\n")?;
            start = i + 1;
        }
        self.inner.write_all(&buf[start..])?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Log writer for stdout; translates line endings only on a terminal.
pub fn console_writer() -> CrlfWriter<io::Stdout> {
    let stdout = io::stdout();
    let translate = stdout.is_terminal();
    CrlfWriter::new(stdout, translate)
}
