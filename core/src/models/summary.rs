use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::CopyOutcome;

/// Why a run is reported as an overall failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum SummaryFailure {
	NoSubdirectories,
	NoCopiesPerformed,
	Enumeration(String),
	TaskAborted(String),
}

impl fmt::Display for SummaryFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SummaryFailure::NoSubdirectories => f.write_str("no subdirectories found"),
			SummaryFailure::NoCopiesPerformed => f.write_str("no copies performed"),
			SummaryFailure::Enumeration(msg) => write!(f, "cannot list parent directory: {msg}"),
			SummaryFailure::TaskAborted(msg) => write!(f, "copy task ended unexpectedly: {msg}"),
		}
	}
}

/// Aggregate of one run. Produced once, by [`SummaryBuilder::finish`] or
/// one of the early-exit constructors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CopySummary {
	pub successful: u64,
	pub skipped: u64,
	pub failed: u64,
	pub total: u64,
	pub succeeded_overall: bool,
	pub cancelled: bool,
	pub failure: Option<SummaryFailure>,
}

impl CopySummary {
	pub fn processed(&self) -> u64 {
		self.successful + self.skipped + self.failed
	}

	/// Human-readable reason for an overall failure.
	pub fn reason(&self) -> Option<String> {
		self.failure.as_ref().map(ToString::to_string)
	}

	fn aborted(failure: SummaryFailure) -> Self {
		Self {
			successful: 0,
			skipped: 0,
			failed: 0,
			total: 0,
			succeeded_overall: false,
			cancelled: false,
			failure: Some(failure),
		}
	}

	pub fn no_subdirectories() -> Self {
		Self::aborted(SummaryFailure::NoSubdirectories)
	}

	pub fn enumeration_failed(message: impl Into<String>) -> Self {
		Self::aborted(SummaryFailure::Enumeration(message.into()))
	}

	pub fn task_aborted(message: impl Into<String>) -> Self {
		Self::aborted(SummaryFailure::TaskAborted(message.into()))
	}
}

/// Tallies outcomes as they arrive. `total` is fixed at construction.
#[derive(Debug)]
pub struct SummaryBuilder {
	successful: u64,
	skipped: u64,
	failed: u64,
	total: u64,
	cancelled: bool,
}

impl SummaryBuilder {
	pub fn new(total: u64) -> Self {
		Self {
			successful: 0,
			skipped: 0,
			failed: 0,
			total,
			cancelled: false,
		}
	}

	pub fn record(&mut self, outcome: &CopyOutcome) {
		debug_assert!(self.processed() < self.total, "more outcomes than subdirectories");
		match outcome {
			CopyOutcome::Copied => self.successful += 1,
			CopyOutcome::Skipped => self.skipped += 1,
			CopyOutcome::Failed(_) => self.failed += 1,
		}
	}

	pub fn mark_cancelled(&mut self) {
		self.cancelled = true;
	}

	pub fn processed(&self) -> u64 {
		self.successful + self.skipped + self.failed
	}

	/// Rounded percentage of subdirectories processed so far.
	pub fn percent(&self) -> u8 {
		if self.total == 0 {
			return 0;
		}
		let pct = (self.processed() as f64 / self.total as f64 * 100.0).round();
		pct.min(100.0) as u8
	}

	pub fn finish(self) -> CopySummary {
		let succeeded_overall = self.successful > 0;
		CopySummary {
			successful: self.successful,
			skipped: self.skipped,
			failed: self.failed,
			total: self.total,
			succeeded_overall,
			cancelled: self.cancelled,
			failure: (!succeeded_overall).then_some(SummaryFailure::NoCopiesPerformed),
		}
	}
}
