use std::{fs, io, path::Path};

use filetime::FileTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CopyError {
	#[error("source file not found: {0}")]
	SourceNotFound(String),

	#[error("target directory missing: {0}")]
	TargetDirMissing(String),

	#[error("permission denied: {0}")]
	PermissionDenied(String),

	#[error("disk full: {0}")]
	DiskFull(String),

	#[error("I/O error: {0}")]
	IoError(String),
}

/// Copies one file to one target. Callers only invoke it for targets that
/// did not exist a moment earlier.
pub trait FileCopier: Send + Sync {
	/// Returns the number of bytes written.
	fn copy_file(&self, source: &Path, target: &Path) -> Result<u64, CopyError>;
}

/// Plain filesystem copy: content and permissions via `fs::copy`, then
/// access/modification times restored from the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdCopier;

impl FileCopier for StdCopier {
	fn copy_file(&self, source: &Path, target: &Path) -> Result<u64, CopyError> {
		let metadata = fs::metadata(source).map_err(|e| map_io_error(e, source))?;
		let bytes = fs::copy(source, target).map_err(|e| match e.kind() {
			io::ErrorKind::NotFound => CopyError::TargetDirMissing(target.display().to_string()),
			_ => map_io_error(e, target),
		})?;

		let mtime = FileTime::from_last_modification_time(&metadata);
		let atime = FileTime::from_last_access_time(&metadata);
		filetime::set_file_times(target, atime, mtime).map_err(|e| map_io_error(e, target))?;

		Ok(bytes)
	}
}

fn map_io_error(err: io::Error, path: &Path) -> CopyError {
	let path = path.display().to_string();
	match err.kind() {
		io::ErrorKind::NotFound => CopyError::SourceNotFound(path),
		io::ErrorKind::PermissionDenied => CopyError::PermissionDenied(path),
		io::ErrorKind::StorageFull => CopyError::DiskFull(path),
		_ => CopyError::IoError(format!("{path}: {err}")),
	}
}
