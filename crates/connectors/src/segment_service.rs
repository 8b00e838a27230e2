//! In-memory segment service with import jobs and resource tagging.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use reengage_core::types::{
    ImportJob, ImportJobDefinition, ImportJobRequest, ImportJobState, Segment, SegmentType,
};
use reengage_core::{ReengageError, ReengageResult, SegmentService};
use tracing::debug;

use crate::failure::FailureInjector;

const SERVICE: &str = "segment_service";

struct SandboxImport {
    job: ImportJob,
    polls_remaining: u32,
    fail_with: Option<String>,
}

pub struct InMemorySegmentService {
    region: String,
    external_id: String,
    polls_until_complete: u32,
    segments: DashMap<String, Vec<Segment>>,
    jobs: DashMap<String, SandboxImport>,
    tokens: DashMap<String, String>,
    requests: parking_lot::Mutex<Vec<ImportJobRequest>>,
    next_import: AtomicU64,
    next_segment: AtomicU64,
    pub failures: FailureInjector,
}

impl InMemorySegmentService {
    pub fn new(region: String, external_id: String, polls_until_complete: u32) -> Self {
        Self {
            region,
            external_id,
            polls_until_complete,
            segments: DashMap::new(),
            jobs: DashMap::new(),
            tokens: DashMap::new(),
            requests: parking_lot::Mutex::new(Vec::new()),
            next_import: AtomicU64::new(1),
            next_segment: AtomicU64::new(1),
            failures: FailureInjector::new(),
        }
    }

    /// Append a segment to an application's list.
    pub fn add_segment(&self, application_id: &str, segment: Segment) {
        self.segments
            .entry(application_id.to_string())
            .or_default()
            .push(segment);
    }

    pub fn segment(&self, application_id: &str, segment_id: &str) -> Option<Segment> {
        self.segments
            .get(application_id)?
            .iter()
            .find(|s| s.id == segment_id)
            .cloned()
    }

    /// Every import request received, in arrival order.
    pub fn import_requests(&self) -> Vec<ImportJobRequest> {
        self.requests.lock().clone()
    }

    pub fn import_count(&self) -> usize {
        self.jobs.len()
    }

    /// Make an import end in `FAILED` once its polls run out.
    pub fn fail_import(&self, import_id: &str, reason: impl Into<String>) -> bool {
        match self.jobs.get_mut(import_id) {
            Some(mut import) => {
                import.fail_with = Some(reason.into());
                true
            }
            None => false,
        }
    }

    fn allocate_segment_id(&self, application_id: &str) -> String {
        loop {
            let id = format!("s{}", self.next_segment.fetch_add(1, Ordering::Relaxed));
            if self.segment(application_id, &id).is_none() {
                return id;
            }
        }
    }

    fn resolve_target(
        &self,
        application_id: &str,
        request: &ImportJobRequest,
    ) -> ReengageResult<String> {
        let invalid = |message: String| {
            ReengageError::service(SERVICE, "create_import_job", message)
        };

        match (&request.segment_id, request.define_segment.unwrap_or(false)) {
            (Some(_), true) => Err(invalid(
                "segmentId and defineSegment are mutually exclusive".to_string(),
            )),
            (Some(segment_id), false) => {
                if self.segment(application_id, segment_id).is_none() {
                    return Err(invalid(format!("segment {} does not exist", segment_id)));
                }
                Ok(segment_id.clone())
            }
            (None, true) => {
                let name = request
                    .segment_name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| invalid("segmentName is required".to_string()))?;
                let id = self.allocate_segment_id(application_id);
                self.add_segment(
                    application_id,
                    Segment {
                        id: id.clone(),
                        name,
                        external_id: Some(self.external_id.clone()),
                        segment_type: SegmentType::Import,
                        tags: HashMap::new(),
                    },
                );
                Ok(id)
            }
            (None, false) => Err(invalid(
                "either segmentId or defineSegment must be set".to_string(),
            )),
        }
    }
}

/// Split `arn:aws:mobiletargeting:{region}:{account}:apps/{app}/segments/{segment}`.
fn parse_segment_arn(arn: &str) -> Option<(&str, &str, &str)> {
    let mut parts = arn.splitn(6, ':');
    if parts.next()? != "arn" || parts.next()? != "aws" || parts.next()? != "mobiletargeting" {
        return None;
    }
    let region = parts.next()?;
    let _account = parts.next()?;
    let resource = parts.next()?;

    let mut path = resource.split('/');
    match (path.next()?, path.next()?, path.next()?, path.next()?, path.next()) {
        ("apps", app, "segments", segment, None) => Some((region, app, segment)),
        _ => None,
    }
}

#[async_trait]
impl SegmentService for InMemorySegmentService {
    async fn get_segments(&self, application_id: &str) -> ReengageResult<Vec<Segment>> {
        self.failures.check(SERVICE, "get_segments")?;
        Ok(self
            .segments
            .get(application_id)
            .map(|s| s.value().clone())
            .unwrap_or_default())
    }

    async fn create_import_job(
        &self,
        application_id: &str,
        request: ImportJobRequest,
    ) -> ReengageResult<ImportJob> {
        self.failures.check(SERVICE, "create_import_job")?;
        self.requests.lock().push(request.clone());

        if let Some(token) = &request.client_token {
            if let Some(existing) = self.tokens.get(token) {
                if let Some(import) = self.jobs.get(existing.value()) {
                    debug!(import_id = %import.job.id, token = %token, "sandbox import replayed");
                    return Ok(import.job.clone());
                }
            }
        }

        let segment_id = self.resolve_target(application_id, &request)?;
        let id = format!("i{}", self.next_import.fetch_add(1, Ordering::Relaxed));
        let job = ImportJob {
            id: id.clone(),
            application_id: application_id.to_string(),
            state: ImportJobState::Created,
            definition: ImportJobDefinition {
                segment_id,
                external_id: self.external_id.clone(),
                format: request.format,
                role_arn: request.role_arn.clone(),
                s3_url: request.s3_url.clone(),
                define_segment: request.define_segment.unwrap_or(false),
                segment_name: request.segment_name.clone(),
            },
            failures: Vec::new(),
            created_at: Utc::now(),
        };

        if let Some(token) = request.client_token {
            self.tokens.insert(token, id.clone());
        }
        self.jobs.insert(
            id,
            SandboxImport {
                job: job.clone(),
                polls_remaining: self.polls_until_complete,
                fail_with: None,
            },
        );
        Ok(job)
    }

    async fn get_import_job(
        &self,
        application_id: &str,
        import_id: &str,
    ) -> ReengageResult<ImportJob> {
        self.failures.check(SERVICE, "get_import_job")?;
        let mut import = self
            .jobs
            .get_mut(import_id)
            .filter(|i| i.job.application_id == application_id)
            .ok_or_else(|| {
                ReengageError::service(
                    SERVICE,
                    "get_import_job",
                    format!("import {} does not exist", import_id),
                )
            })?;

        if import.polls_remaining > 0 {
            import.polls_remaining -= 1;
            import.job.state = ImportJobState::Processing;
        } else if let Some(reason) = import.fail_with.clone() {
            import.job.state = ImportJobState::Failed;
            import.job.failures = vec![reason];
        } else {
            import.job.state = ImportJobState::Completed;
        }
        Ok(import.job.clone())
    }

    async fn tag_resource(
        &self,
        resource_arn: &str,
        tags: HashMap<String, String>,
    ) -> ReengageResult<()> {
        self.failures.check(SERVICE, "tag_resource")?;
        let fail = |message: String| ReengageError::service(SERVICE, "tag_resource", message);

        let (region, application_id, segment_id) = parse_segment_arn(resource_arn)
            .ok_or_else(|| fail(format!("malformed resource arn {}", resource_arn)))?;
        if region != self.region {
            return Err(fail(format!(
                "resource region {} does not match service region {}",
                region, self.region
            )));
        }

        let mut segments = self
            .segments
            .get_mut(application_id)
            .ok_or_else(|| fail(format!("application {} does not exist", application_id)))?;
        let segment = segments
            .iter_mut()
            .find(|s| s.id == segment_id)
            .ok_or_else(|| fail(format!("segment {} does not exist", segment_id)))?;
        segment.tags.extend(tags);
        Ok(())
    }
}
