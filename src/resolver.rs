use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::camera::FRAME_DIR_NAME;
use crate::error::{Error, Result};

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn require_dir(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(Error::InvalidSourceDirectory(root.to_path_buf()))
    }
}

/// Recursively find every file under `root` whose name ends with `.<suffix>`
pub fn find_matching(root: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    require_dir(root)?;

    let extension = suffix.trim_start_matches('.');
    if extension.is_empty() {
        return Err(Error::MissingFormat);
    }
    let ending = format!(".{}", extension);

    let mut files = Vec::new();

    for entry_result in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                if let Some(path) = err.path() {
                    warn!("Failed to access {}: {}", path.display(), err);
                } else {
                    warn!("Directory walk error: {}", err);
                }
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .file_name()
            .to_str()
            .map(|name| name.ends_with(&ending))
            .unwrap_or(false);

        if matches {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Find every frame directory matching `<root>/*/rgb/`
pub fn find_frame_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    require_dir(root)?;

    let mut dirs = Vec::new();

    for entry_result in WalkDir::new(root)
        .follow_links(true)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };

        // hidden camera folders are pruned at depth 1
        if entry.depth() == 2
            && entry.file_type().is_dir()
            && entry.file_name() == OsStr::new(FRAME_DIR_NAME)
        {
            dirs.push(entry.into_path());
        }
    }

    Ok(dirs)
}
