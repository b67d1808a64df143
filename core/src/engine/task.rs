use std::{
	path::Path,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use super::{copier::FileCopier, scanner};
use crate::models::{CopyEvent, CopyJob, CopyOutcome, CopySummary, SummaryBuilder};

const SEPARATOR: &str = "--------------------------------------------------";

/// Shared stop request. The controller writes it, the task only reads it.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::Release);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}

/// Receiver of task events.
pub trait EventSink {
	fn emit(&self, event: CopyEvent);
}

impl EventSink for UnboundedSender<CopyEvent> {
	fn emit(&self, event: CopyEvent) {
		// Receiver gone means nobody is listening anymore; the run carries on.
		let _ = self.send(event);
	}
}

impl<F: Fn(CopyEvent)> EventSink for F {
	fn emit(&self, event: CopyEvent) {
		self(event)
	}
}

#[derive(Debug, Clone, Copy)]
pub struct TaskOptions {
	/// Visit subdirectories in file-name order instead of listing order.
	pub sort_subdirectories: bool,
}

impl Default for TaskOptions {
	fn default() -> Self {
		Self { sort_subdirectories: true }
	}
}

/// Copy `job.source_file` into every immediate subdirectory of
/// `job.parent_directory`, skipping those that already hold a same-named entry.
///
/// Blocking. Cancellation is checked before each subdirectory, never during a
/// copy. The returned summary has also been emitted as the final event.
pub fn run_copy_task(
	job: &CopyJob,
	options: TaskOptions,
	cancel: &CancelFlag,
	copier: &dyn FileCopier,
	sink: &dyn EventSink,
) -> CopySummary {
	let summary = execute(job, options, cancel, copier, sink);
	sink.emit(CopyEvent::Summary(summary.clone()));
	summary
}

fn execute(
	job: &CopyJob,
	options: TaskOptions,
	cancel: &CancelFlag,
	copier: &dyn FileCopier,
	sink: &dyn EventSink,
) -> CopySummary {
	info!(
		parent = %job.parent_directory.display(),
		source = %job.source_file.display(),
		"copy run starting"
	);
	sink.emit(CopyEvent::log("starting copy run"));
	sink.emit(CopyEvent::log(format!("parent directory: {}", job.parent_directory.display())));
	sink.emit(CopyEvent::log(format!("source file: {}", job.source_file.display())));
	sink.emit(CopyEvent::log(SEPARATOR));

	let subdirs = match scanner::list_subdirectories(&job.parent_directory, options.sort_subdirectories) {
		Ok(dirs) => dirs,
		Err(e) => {
			warn!("enumeration failed: {}", e);
			sink.emit(CopyEvent::log(format!("error: {e}")));
			return CopySummary::enumeration_failed(e.to_string());
		}
	};

	if subdirs.is_empty() {
		info!("no subdirectories under {}", job.parent_directory.display());
		sink.emit(CopyEvent::log("no subdirectories found"));
		return CopySummary::no_subdirectories();
	}

	let total = subdirs.len();
	info!("found {} subdirectories", total);
	sink.emit(CopyEvent::log(format!("found {total} subdirectories")));
	sink.emit(CopyEvent::log(SEPARATOR));

	let mut tally = SummaryBuilder::new(total as u64);

	for (i, subdir) in subdirs.iter().enumerate() {
		if cancel.is_cancelled() {
			info!("run cancelled after {} of {} subdirectories", i, total);
			sink.emit(CopyEvent::log("stopped by operator"));
			tally.mark_cancelled();
			break;
		}

		let name = subdir.file_name().unwrap_or(subdir.as_os_str()).to_string_lossy();
		sink.emit(CopyEvent::log(format!("[{}/{}] processing {}", i + 1, total, name)));

		let outcome = process_subdirectory(job, subdir, copier);
		match &outcome {
			CopyOutcome::Copied => sink.emit(CopyEvent::log("  copied")),
			CopyOutcome::Skipped => sink.emit(CopyEvent::log("  skipped: already exists")),
			CopyOutcome::Failed(reason) => {
				warn!("copy into {} failed: {}", subdir.display(), reason);
				sink.emit(CopyEvent::log(format!("  error: {reason}")));
			}
		}

		tally.record(&outcome);
		sink.emit(CopyEvent::Progress(tally.percent()));
	}

	let summary = tally.finish();
	emit_results(&summary, job, sink);
	info!(
		successful = summary.successful,
		skipped = summary.skipped,
		failed = summary.failed,
		total = summary.total,
		cancelled = summary.cancelled,
		"copy run finished"
	);
	summary
}

fn process_subdirectory(job: &CopyJob, subdir: &Path, copier: &dyn FileCopier) -> CopyOutcome {
	let target = job.target_in(subdir);

	// symlink_metadata so a dangling link at the target still counts as present.
	if target.symlink_metadata().is_ok() {
		return CopyOutcome::Skipped;
	}

	match copier.copy_file(&job.source_file, &target) {
		Ok(_) => CopyOutcome::Copied,
		Err(e) => CopyOutcome::Failed(e.to_string()),
	}
}

fn emit_results(summary: &CopySummary, job: &CopyJob, sink: &dyn EventSink) {
	sink.emit(CopyEvent::log(SEPARATOR));
	sink.emit(CopyEvent::log("copy results:"));
	sink.emit(CopyEvent::log(format!("successful: {}", summary.successful)));
	sink.emit(CopyEvent::log(format!("skipped: {}", summary.skipped)));
	sink.emit(CopyEvent::log(format!("failed: {}", summary.failed)));
	sink.emit(CopyEvent::log(format!("total subdirectories: {}", summary.total)));

	if summary.succeeded_overall {
		sink.emit(CopyEvent::log(format!(
			"{} copied into {} subdirectories",
			job.file_name().to_string_lossy(),
			summary.successful
		)));
	} else {
		sink.emit(CopyEvent::log("no copies performed"));
	}
}
