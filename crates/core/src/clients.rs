//! Service-client contracts for the analytic query engine and the segment
//! service.
//!
//! Components accept an `Arc<dyn QueryEngine>` / `Arc<dyn SegmentService>`
//! at construction so the backing implementation can be swapped for the
//! sandbox connectors in tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ReengageResult;
use crate::types::{ImportJob, ImportJobRequest, NamedQuery, QueryExecution, Segment, StartQueryRequest};

/// Asynchronous analytic query engine.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn get_named_query(&self, named_query_id: &str) -> ReengageResult<NamedQuery>;

    /// Start an execution and return its id without waiting for completion.
    async fn start_query_execution(&self, request: StartQueryRequest) -> ReengageResult<String>;

    async fn get_query_execution(&self, execution_id: &str) -> ReengageResult<QueryExecution>;
}

/// Audience segment management service.
#[async_trait]
pub trait SegmentService: Send + Sync {
    /// All segments of an application, in service order.
    async fn get_segments(&self, application_id: &str) -> ReengageResult<Vec<Segment>>;

    async fn create_import_job(
        &self,
        application_id: &str,
        request: ImportJobRequest,
    ) -> ReengageResult<ImportJob>;

    async fn get_import_job(&self, application_id: &str, import_id: &str)
        -> ReengageResult<ImportJob>;

    /// Merge `tags` into the tag set of the resource.
    async fn tag_resource(
        &self,
        resource_arn: &str,
        tags: HashMap<String, String>,
    ) -> ReengageResult<()>;
}
