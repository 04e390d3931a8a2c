//! Atomic file replacement

use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// Replace `path` with `bytes`: write a temp file in the same directory,
/// fsync it, then rename over the target. Readers see either the old or the
/// new content, never a partial write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!("Wrote {} bytes to {:?}", bytes.len(), path);
    Ok(())
}
