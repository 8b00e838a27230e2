pub mod clients;
pub mod config;
pub mod error;
pub mod types;

pub use clients::{QueryEngine, SegmentService};
pub use config::AppConfig;
pub use error::{ReengageError, ReengageResult};
