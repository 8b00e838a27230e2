use std::sync::Arc;

use reengage_core::types::{ImportFormat, ImportJobRequest, Segment};
use reengage_core::{ReengageResult, SegmentService};
use tracing::info;

use crate::resolver::SegmentResolver;
use crate::types::ImportStarted;

/// Starts an import of exported records into the re-engagement segment,
/// defining a new segment when none exists yet.
pub struct SegmentImportInitiator {
    service: Arc<dyn SegmentService>,
    resolver: SegmentResolver,
    application_id: String,
    role_arn: String,
    segment_name: String,
    wait_time: u64,
}

impl SegmentImportInitiator {
    pub fn new(
        service: Arc<dyn SegmentService>,
        resolver: SegmentResolver,
        application_id: impl Into<String>,
        role_arn: impl Into<String>,
        segment_name: impl Into<String>,
        wait_time: u64,
    ) -> Self {
        Self {
            service,
            resolver,
            application_id: application_id.into(),
            role_arn: role_arn.into(),
            segment_name: segment_name.into(),
            wait_time,
        }
    }

    /// Import request targeting `existing`, or defining a new segment.
    pub fn build_request(
        &self,
        existing: Option<&Segment>,
        output_location: &str,
        idempotency_key: Option<&str>,
    ) -> ImportJobRequest {
        let (segment_id, define_segment, segment_name) = match existing {
            Some(segment) => (Some(segment.id.clone()), None, None),
            None => (None, Some(true), Some(self.segment_name.clone())),
        };

        ImportJobRequest {
            format: ImportFormat::Csv,
            role_arn: self.role_arn.clone(),
            s3_url: output_location.to_string(),
            segment_id,
            define_segment,
            segment_name,
            client_token: idempotency_key.map(String::from),
        }
    }

    /// Resolve the target segment and create one import job from
    /// `output_location`.
    ///
    /// Without an `idempotency_key`, calling this twice creates two jobs.
    pub async fn start(
        &self,
        output_location: &str,
        idempotency_key: Option<&str>,
    ) -> ReengageResult<ImportStarted> {
        let segments = self.service.get_segments(&self.application_id).await?;
        let existing = self.resolver.resolve(&self.application_id, &segments)?;
        let request = self.build_request(existing, output_location, idempotency_key);

        let job = self
            .service
            .create_import_job(&self.application_id, request)
            .await?;

        metrics::counter!("workflow.imports_started").increment(1);
        info!(
            application_id = %self.application_id,
            import_id = %job.id,
            segment_id = %job.definition.segment_id,
            new_segment = existing.is_none(),
            "segment import started"
        );

        Ok(ImportStarted {
            import_id: job.id,
            segment_id: job.definition.segment_id,
            external_id: job.definition.external_id,
            wait_time: self.wait_time,
        })
    }
}
