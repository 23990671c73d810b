//! Small filesystem utilities.

use std::path::Path;

use crate::ReportResult;

/// Renames `from` to `to`, falling back to copy-and-delete when the two live
/// on different filesystems (the analysis tool saves under `$HOME/pprof`).
pub fn move_file(from: &Path, to: &Path) -> ReportResult<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(err.into()),
        Err(err) => {
            tracing::debug!(
                "rename {} -> {} failed ({err}), copying instead",
                from.display(),
                to.display()
            );
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)?;
            Ok(())
        }
    }
}

/// Removes a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> ReportResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
