//! Export pipeline record conversion — turns query result records into the
//! newline-delimited form the delivery stream writes to storage.

pub mod transformer;
pub mod types;

pub use transformer::RecordTransformer;
pub use types::{InputRecord, OutputRecord, RecordResult, TransformationRequest, TransformationResponse};
