use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extensions (lowercase) the ingestor treats as audio.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "m4b", "m4p", "alac", "flac", "ogg", "dsf"];

/// Whether `path` has a supported audio extension (case-insensitive).
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Walks `root` recursively, calling `visit` for every supported audio file.
///
/// Blocking. The first traversal error stops the walk and is returned, so
/// callers can abort before touching the database.
pub fn walk_audio_files(root: &Path, mut visit: impl FnMut(PathBuf)) -> Result<usize> {
    let mut visited = 0;

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            Error::walk(path, e.to_string())
        })?;

        if entry.file_type().is_file() && is_supported_audio(entry.path()) {
            visited += 1;
            visit(entry.into_path());
        }
    }

    Ok(visited)
}
