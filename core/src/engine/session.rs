use std::{path::PathBuf, sync::Arc, time::Duration};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{
	sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
	task::JoinHandle,
};
use tracing::{error, info, warn};

use super::{
	copier::{FileCopier, StdCopier},
	task::{run_copy_task, CancelFlag, TaskOptions},
};
use crate::models::{CopyEvent, CopyJob, CopySummary, RunState};

/// Reasons `start` refuses to launch a run. Nothing reaches the task.
#[derive(Debug, Error)]
pub enum InvalidInput {
	#[error("parent directory does not exist: {}", .0.display())]
	ParentMissing(PathBuf),

	#[error("source file does not exist: {}", .0.display())]
	SourceMissing(PathBuf),

	#[error("a copy run is already in progress")]
	AlreadyRunning,
}

/// Owns the lifecycle of one background copy task at a time and relays its
/// events, in order, to the presentation layer.
///
/// Must be used from within a tokio runtime.
pub struct SessionController {
	events: UnboundedSender<CopyEvent>,
	options: TaskOptions,
	copier: Arc<dyn FileCopier>,
	state: Arc<Mutex<RunState>>,
	cancel: Option<CancelFlag>,
	relay: Option<JoinHandle<()>>,
}

impl SessionController {
	pub fn new(events: UnboundedSender<CopyEvent>) -> Self {
		Self {
			events,
			options: TaskOptions::default(),
			copier: Arc::new(StdCopier),
			state: Arc::new(Mutex::new(RunState::Idle)),
			cancel: None,
			relay: None,
		}
	}

	/// Controller plus the receiving end of its event stream.
	pub fn channel() -> (Self, UnboundedReceiver<CopyEvent>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self::new(tx), rx)
	}

	pub fn with_options(mut self, options: TaskOptions) -> Self {
		self.options = options;
		self
	}

	pub fn with_copier(mut self, copier: Arc<dyn FileCopier>) -> Self {
		self.copier = copier;
		self
	}

	pub fn state(&self) -> RunState {
		*self.state.lock()
	}

	/// Validate the inputs and launch the copy task in the background.
	pub fn start(&mut self, parent_directory: impl Into<PathBuf>, source_file: impl Into<PathBuf>) -> Result<(), InvalidInput> {
		let job = CopyJob::new(parent_directory, source_file);

		let mut state = self.state.lock();
		if state.is_active() {
			return Err(InvalidInput::AlreadyRunning);
		}
		if !job.parent_directory.exists() {
			return Err(InvalidInput::ParentMissing(job.parent_directory));
		}
		if !job.source_file.exists() {
			return Err(InvalidInput::SourceMissing(job.source_file));
		}
		*state = RunState::Running;
		drop(state);

		info!(
			parent = %job.parent_directory.display(),
			source = %job.source_file.display(),
			"launching copy task"
		);

		let cancel = CancelFlag::new();
		let (task_tx, task_rx) = mpsc::unbounded_channel();

		let worker = tokio::task::spawn_blocking({
			let cancel = cancel.clone();
			let copier = Arc::clone(&self.copier);
			let options = self.options;
			move || run_copy_task(&job, options, &cancel, copier.as_ref(), &task_tx)
		});

		self.cancel = Some(cancel);
		self.relay = Some(tokio::spawn(relay(task_rx, self.events.clone(), Arc::clone(&self.state), worker)));

		Ok(())
	}

	/// Ask the running task to stop before its next subdirectory.
	/// Returns whether a stop signal was actually sent.
	pub fn request_stop(&mut self) -> bool {
		let mut state = self.state.lock();
		if *state != RunState::Running {
			return false;
		}
		*state = RunState::CancelRequested;
		if let Some(cancel) = &self.cancel {
			cancel.cancel();
		}
		info!("stop requested");
		true
	}

	/// Wait up to `timeout` for the current run to deliver its summary.
	///
	/// Returns `true` if there is no run in flight by the end. On timeout the
	/// copy already underway is left to finish on its own and the run stays
	/// tracked, so a later call waits on it again.
	pub async fn await_completion(&mut self, timeout: Duration) -> bool {
		let Some(relay) = self.relay.as_mut() else {
			return true;
		};

		let finished = match tokio::time::timeout(timeout, relay).await {
			Ok(Ok(())) => true,
			Ok(Err(e)) => {
				error!("event relay failed: {}", e);
				true
			}
			Err(_) => {
				warn!("copy task still running after {:?}", timeout);
				false
			}
		};
		if finished {
			self.relay = None;
		}
		finished
	}
}

/// Forward task events to the presentation layer. Guarantees exactly one
/// summary is delivered, even if the task dies without producing one.
async fn relay(
	mut task_rx: UnboundedReceiver<CopyEvent>,
	out: UnboundedSender<CopyEvent>,
	state: Arc<Mutex<RunState>>,
	worker: JoinHandle<CopySummary>,
) {
	let mut delivered_summary = false;

	while let Some(event) = task_rx.recv().await {
		if event.is_terminal() {
			*state.lock() = RunState::Finished;
			delivered_summary = true;
		}
		let _ = out.send(event);
		if delivered_summary {
			break;
		}
	}

	if !delivered_summary {
		let message = match worker.await {
			Err(e) => e.to_string(),
			Ok(_) => "event stream closed before the summary".to_string(),
		};
		error!("copy task ended without a summary: {}", message);
		*state.lock() = RunState::Finished;
		let _ = out.send(CopyEvent::Summary(CopySummary::task_aborted(message)));
	}

	// A new run may already have been started from the summary handler.
	let mut state = state.lock();
	if *state == RunState::Finished {
		*state = RunState::Idle;
	}
}

#[cfg(test)]
mod tests {
	use std::{
		fs,
		path::Path,
		sync::{Condvar, Mutex as StdMutex},
	};

	use super::*;
	use crate::engine::copier::CopyError;

	/// Blocks every copy until released, so tests can hold a run in `Running`.
	#[derive(Default)]
	struct Gate {
		open: StdMutex<bool>,
		cv: Condvar,
	}

	impl Gate {
		fn release(&self) {
			*self.open.lock().unwrap() = true;
			self.cv.notify_all();
		}
	}

	impl FileCopier for Gate {
		fn copy_file(&self, source: &Path, target: &Path) -> Result<u64, CopyError> {
			let mut open = self.open.lock().unwrap();
			while !*open {
				open = self.cv.wait(open).unwrap();
			}
			StdCopier.copy_file(source, target)
		}
	}

	fn tree(subdirs: &[&str]) -> (tempfile::TempDir, PathBuf, PathBuf) {
		let tmp = tempfile::tempdir().unwrap();
		let parent = tmp.path().join("parent");
		fs::create_dir(&parent).unwrap();
		for name in subdirs {
			fs::create_dir(parent.join(name)).unwrap();
		}
		let source = tmp.path().join("app.exe");
		fs::write(&source, "payload").unwrap();
		(tmp, parent, source)
	}

	#[tokio::test]
	async fn rejects_missing_paths() {
		let (_tmp, parent, source) = tree(&["A"]);
		let (mut session, _rx) = SessionController::channel();

		let err = session.start(parent.join("nope"), &source).unwrap_err();
		assert!(matches!(err, InvalidInput::ParentMissing(_)));

		let err = session.start(&parent, parent.join("nope.exe")).unwrap_err();
		assert!(matches!(err, InvalidInput::SourceMissing(_)));

		assert_eq!(session.state(), RunState::Idle);
	}

	#[tokio::test]
	async fn request_stop_when_idle_is_noop() {
		let (mut session, _rx) = SessionController::channel();
		assert!(!session.request_stop());
		assert_eq!(session.state(), RunState::Idle);
		assert!(session.await_completion(Duration::from_millis(10)).await);
	}

	#[tokio::test]
	async fn second_start_while_running_is_rejected() {
		let (_tmp, parent, source) = tree(&["A", "B"]);
		let gate = Arc::new(Gate::default());
		let (session, mut rx) = SessionController::channel();
		let mut session = session.with_copier(gate.clone());

		session.start(&parent, &source).unwrap();
		assert_eq!(session.state(), RunState::Running);
		assert!(matches!(session.start(&parent, &source), Err(InvalidInput::AlreadyRunning)));

		gate.release();
		assert!(session.await_completion(Duration::from_secs(5)).await);
		assert_eq!(session.state(), RunState::Idle);

		let mut last = None;
		while let Ok(e) = rx.try_recv() {
			last = Some(e);
		}
		let Some(CopyEvent::Summary(summary)) = last else {
			panic!("last event was not a summary");
		};
		assert_eq!(summary.successful, 2);
	}

	#[tokio::test]
	async fn stop_moves_to_cancel_requested_then_idle() {
		let (_tmp, parent, source) = tree(&["A", "B", "C"]);
		let gate = Arc::new(Gate::default());
		let (session, mut rx) = SessionController::channel();
		let mut session = session.with_copier(gate.clone());

		session.start(&parent, &source).unwrap();
		assert!(session.request_stop());
		assert_eq!(session.state(), RunState::CancelRequested);
		assert!(!session.request_stop());

		gate.release();
		assert!(session.await_completion(Duration::from_secs(5)).await);
		assert_eq!(session.state(), RunState::Idle);

		let mut summaries = Vec::new();
		while let Ok(e) = rx.try_recv() {
			if let CopyEvent::Summary(s) = e {
				summaries.push(s);
			}
		}
		assert_eq!(summaries.len(), 1);
		assert!(summaries[0].cancelled);
		assert!(summaries[0].processed() <= 1);
	}

	#[tokio::test]
	async fn await_completion_times_out_on_stuck_copy() {
		let (_tmp, parent, source) = tree(&["A"]);
		let gate = Arc::new(Gate::default());
		let (session, _rx) = SessionController::channel();
		let mut session = session.with_copier(gate.clone());

		session.start(&parent, &source).unwrap();

		assert!(!session.await_completion(Duration::from_millis(50)).await);
		assert_eq!(session.state(), RunState::Running);

		// Let the blocking thread wind down so the runtime can shut down.
		gate.release();
	}

	#[tokio::test]
	async fn await_completion_keeps_tracking_after_timeout() {
		let (_tmp, parent, source) = tree(&["A"]);
		let gate = Arc::new(Gate::default());
		let (session, _rx) = SessionController::channel();
		let mut session = session.with_copier(gate.clone());

		session.start(&parent, &source).unwrap();

		assert!(!session.await_completion(Duration::from_millis(50)).await);
		assert!(!session.await_completion(Duration::from_millis(50)).await);
		assert_eq!(session.state(), RunState::Running);

		gate.release();
		assert!(session.await_completion(Duration::from_secs(5)).await);
		assert_eq!(session.state(), RunState::Idle);
		assert!(session.await_completion(Duration::from_millis(10)).await);
	}

	struct Panicking;

	impl FileCopier for Panicking {
		fn copy_file(&self, _: &Path, _: &Path) -> Result<u64, CopyError> {
			panic!("copier blew up");
		}
	}

	#[tokio::test]
	async fn panicking_task_still_yields_a_summary() {
		let (_tmp, parent, source) = tree(&["A"]);
		let (session, mut rx) = SessionController::channel();
		let mut session = session.with_copier(Arc::new(Panicking));

		session.start(&parent, &source).unwrap();
		assert!(session.await_completion(Duration::from_secs(5)).await);

		let mut last = None;
		while let Ok(e) = rx.try_recv() {
			last = Some(e);
		}
		let Some(CopyEvent::Summary(summary)) = last else {
			panic!("last event was not a summary");
		};
		assert!(!summary.succeeded_overall);
		assert!(summary.reason().unwrap().starts_with("copy task ended unexpectedly"));
		assert_eq!(session.state(), RunState::Idle);
	}
}
