//! Crash-safe file replacement for settings and export files.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use uuid::Uuid;

/// Replace `path` with `content` so readers see either the old file or the new one.
///
/// The text is staged in a uniquely named sibling file, fsynced, then renamed
/// over `path`. Missing parent directories are created. The staging file is
/// removed when any step fails.
pub fn atomic_write_text(path: &Path, content: &str) -> Result<()> {
    let Some(file_name) = path
        .file_name()
        .and_then(OsStr::to_str)
        .filter(|name| !name.is_empty())
    else {
        bail!("not a file path: {}", path.display());
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("cannot create directory {}", dir.display()))?;

    let staging = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
    let written = stage(&staging, content.as_bytes()).and_then(|()| {
        fs::rename(&staging, path).with_context(|| {
            format!(
                "cannot move {} into place at {}",
                staging.display(),
                path.display()
            )
        })
    });
    if written.is_err() {
        let _ = fs::remove_file(&staging);
    }
    written
}

fn stage(staging: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(staging)
        .with_context(|| format!("cannot create staging file {}", staging.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("cannot write staging file {}", staging.display()))?;
    file.sync_all()
        .with_context(|| format!("cannot fsync staging file {}", staging.display()))
}
