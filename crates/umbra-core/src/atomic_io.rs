use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp;

/// Writes `content` to a staging file beside `path`, then renames it into
/// place, so a concurrent reader sees either the old text or the new text
/// in full.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path is empty");
    }
    if path.is_dir() {
        bail!("'{}' is a directory", path.display());
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create state directory {}", dir.display()))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    let staged = dir.join(format!(
        ".{file_name}.tmp-{}-{}",
        std::process::id(),
        current_unix_timestamp()
    ));
    std::fs::write(&staged, content)
        .with_context(|| format!("failed to stage write at {}", staged.display()))?;
    if let Err(error) = std::fs::rename(&staged, path) {
        let _ = std::fs::remove_file(&staged);
        return Err(error)
            .with_context(|| format!("failed to move staged write into {}", path.display()));
    }
    Ok(())
}
