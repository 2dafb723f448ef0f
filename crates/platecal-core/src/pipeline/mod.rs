pub mod config;
pub mod naming;
mod orchestrator;
mod routing;
mod types;

pub use orchestrator::{run_pipeline, run_pipeline_reported};
pub use types::{Destination, FileRecord, FileState, ProgressReporter, RunSummary};
