//! Copy one file into every immediate subdirectory of a parent directory.
//!
//! [`engine::task::run_copy_task`] is the blocking copy loop;
//! [`engine::session::SessionController`] runs it in the background and relays
//! its [`models::CopyEvent`]s.

pub mod engine;
pub mod models;

pub use engine::{
	copier::{CopyError, FileCopier, StdCopier},
	scanner::ScanError,
	session::{InvalidInput, SessionController},
	task::{run_copy_task, CancelFlag, EventSink, TaskOptions},
};
pub use models::{CopyEvent, CopyJob, CopyOutcome, CopySummary, RunState, SummaryFailure};
