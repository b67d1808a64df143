use serde::{Deserialize, Serialize};

use super::summary::CopySummary;

/// Everything a run reports, in the order it happened.
/// `Summary` is always the last event of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum CopyEvent {
	LogLine(String),
	/// Percent of subdirectories processed, 0..=100.
	Progress(u8),
	Summary(CopySummary),
}

impl CopyEvent {
	pub fn log(line: impl Into<String>) -> Self {
		CopyEvent::LogLine(line.into())
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, CopyEvent::Summary(_))
	}
}
