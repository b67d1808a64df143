pub mod event;
pub mod job;
pub mod summary;

pub use event::CopyEvent;
pub use job::{CopyJob, CopyOutcome, RunState};
pub use summary::{CopySummary, SummaryBuilder, SummaryFailure};
