//! Re-engagement workflow — launches the unengaged-user query, imports its
//! output into the re-engagement segment and tags that segment.
//!
//! Each step is invoked independently by an external scheduler and returns a
//! wait hint instead of blocking on the asynchronous operation it started.

pub mod importer;
pub mod launcher;
pub mod orchestrator;
pub mod resolver;
pub mod state_machine;
pub mod store;
pub mod tagger;
pub mod types;

pub use importer::SegmentImportInitiator;
pub use launcher::QueryLauncher;
pub use orchestrator::ReengagementWorkflow;
pub use resolver::SegmentResolver;
pub use state_machine::{WorkflowState, WorkflowStateMachine};
pub use store::{WorkflowRecord, WorkflowStore};
pub use tagger::SegmentTagger;
pub use types::{ImportStarted, QueryStarted, StepStatus};
