//! Writing the capture artifact and handing it to a viewer

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::utils;

/// Overwrite `path` with `bytes`.
///
/// Bytes go to a sibling file first and are renamed into place, so a viewer
/// never opens a half-written image.
pub fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path);
    let written = fs::write(&staging, bytes).and_then(|()| fs::rename(&staging, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".into());
    path.with_file_name(format!(".{}.partial", name))
}

/// Receives the output path after each capture. Failures are not reported.
pub trait Viewer: Send {
    fn open(&self, path: &Path);
}

/// Platform file viewer
pub struct SystemViewer;

impl Viewer for SystemViewer {
    fn open(&self, path: &Path) {
        utils::open_in_viewer(path);
    }
}

/// Does nothing
pub struct NoViewer;

impl Viewer for NoViewer {
    fn open(&self, _path: &Path) {}
}
