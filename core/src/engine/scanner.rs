use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
	#[error("parent directory does not exist: {0}")]
	ParentNotExists(String),

	#[error("parent path is not a directory: {0}")]
	ParentNotDir(String),

	#[error("cannot read {path}: {source}")]
	Unreadable {
		path: String,
		#[source]
		source: walkdir::Error,
	},
}

/// List the immediate subdirectories of `parent`.
///
/// Symlinks are not followed while walking, but a symlink that points at a
/// directory is reported as a subdirectory. With `sort`, entries come back
/// ordered by file name; otherwise in whatever order the OS lists them.
pub fn list_subdirectories(parent: &Path, sort: bool) -> Result<Vec<PathBuf>, ScanError> {
	let parent_str = parent.display().to_string();
	if !parent.exists() {
		return Err(ScanError::ParentNotExists(parent_str));
	}
	if !parent.is_dir() {
		return Err(ScanError::ParentNotDir(parent_str));
	}

	let mut walker = WalkDir::new(parent).min_depth(1).max_depth(1).follow_links(false);
	if sort {
		walker = walker.sort_by_file_name();
	}

	let mut subdirs = Vec::new();
	for entry in walker {
		let entry = match entry {
			Ok(e) => e,
			// Depth 0 means the parent itself could not be opened.
			Err(e) if e.depth() == 0 => {
				return Err(ScanError::Unreadable { path: parent_str, source: e });
			}
			Err(e) => {
				warn!("skipping unreadable entry under {}: {}", parent.display(), e);
				continue;
			}
		};

		let is_dir = entry.file_type().is_dir() || (entry.path_is_symlink() && entry.path().is_dir());
		if is_dir {
			subdirs.push(entry.into_path());
		}
	}

	Ok(subdirs)
}
