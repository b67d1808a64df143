use std::{
	ffi::OsStr,
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// One run's input: which file goes into which parent's subdirectories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CopyJob {
	pub parent_directory: PathBuf,
	pub source_file: PathBuf,
}

impl CopyJob {
	pub fn new(parent_directory: impl Into<PathBuf>, source_file: impl Into<PathBuf>) -> Self {
		Self {
			parent_directory: parent_directory.into(),
			source_file: source_file.into(),
		}
	}

	/// Basename of the source file. Falls back to the whole path when the
	/// source has no final component (e.g. `..`).
	pub fn file_name(&self) -> &OsStr {
		self.source_file
			.file_name()
			.unwrap_or(self.source_file.as_os_str())
	}

	/// Where the source file lands inside `subdirectory`.
	pub fn target_in(&self, subdirectory: &Path) -> PathBuf {
		subdirectory.join(self.file_name())
	}
}

/// Result of visiting one subdirectory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum CopyOutcome {
	Copied,
	Skipped,
	Failed(String),
}

/// Lifecycle of the session controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
	#[default]
	Idle,
	Running,
	CancelRequested,
	Finished,
}

impl RunState {
	/// Whether a task is in flight (including one asked to stop).
	pub fn is_active(self) -> bool {
		matches!(self, RunState::Running | RunState::CancelRequested)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn target_uses_source_basename() {
		let job = CopyJob::new("/srv/parent", "/downloads/telegram.exe");
		assert_eq!(job.file_name(), "telegram.exe");
		assert_eq!(
			job.target_in(Path::new("/srv/parent/A")),
			PathBuf::from("/srv/parent/A/telegram.exe")
		);
	}

	#[test]
	fn active_states() {
		assert!(RunState::Running.is_active());
		assert!(RunState::CancelRequested.is_active());
		assert!(!RunState::Idle.is_active());
		assert!(!RunState::Finished.is_active());
	}
}
