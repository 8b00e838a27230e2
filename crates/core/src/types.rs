use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag key marking the segment that re-engagement campaigns target.
pub const REENGAGEMENT_TAG_KEY: &str = "REENGAGEMENT";
/// Tag value paired with [`REENGAGEMENT_TAG_KEY`].
pub const REENGAGEMENT_TAG_VALUE: &str = "YES";

// ─── Query Engine ───────────────────────────────────────────────────────

/// A stored analytic query bound to a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedQuery {
    pub id: String,
    pub name: String,
    pub query_string: String,
    pub database: String,
}

/// Request to run query text against a database, writing results to
/// `output_location`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQueryRequest {
    pub query_string: String,
    pub database: String,
    pub output_location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryState::Succeeded | QueryState::Failed | QueryState::Cancelled
        )
    }
}

/// One run of a named query. The engine owns every status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryExecution {
    pub id: String,
    pub state: QueryState,
    pub output_location: Option<String>,
    pub state_change_reason: Option<String>,
}

// ─── Segment Service ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentType {
    Dimensional,
    Import,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub name: String,
    pub external_id: Option<String>,
    pub segment_type: SegmentType,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl Segment {
    /// Import segment carrying `REENGAGEMENT=YES`.
    pub fn is_reengagement_import(&self) -> bool {
        self.segment_type == SegmentType::Import
            && self.tags.get(REENGAGEMENT_TAG_KEY).map(String::as_str)
                == Some(REENGAGEMENT_TAG_VALUE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportFormat {
    #[default]
    Csv,
    Json,
}

/// Import job creation request. Exactly one of `segment_id` or
/// `define_segment` + `segment_name` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobRequest {
    pub format: ImportFormat,
    pub role_arn: String,
    pub s3_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub define_segment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_name: Option<String>,
    /// Idempotency key; a service honoring it returns the job already
    /// created for the same token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportJobState {
    Created,
    Initializing,
    Processing,
    Completing,
    Completed,
    Failing,
    Failed,
}

impl ImportJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportJobState::Completed | ImportJobState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobDefinition {
    pub segment_id: String,
    pub external_id: String,
    pub format: ImportFormat,
    pub role_arn: String,
    pub s3_url: String,
    pub define_segment: bool,
    pub segment_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: String,
    pub application_id: String,
    pub state: ImportJobState,
    pub definition: ImportJobDefinition,
    pub failures: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Resource identifier of a segment, as accepted by the tagging call.
pub fn segment_resource_arn(
    region: &str,
    external_id: &str,
    application_id: &str,
    segment_id: &str,
) -> String {
    format!(
        "arn:aws:mobiletargeting:{}:{}:apps/{}/segments/{}",
        region, external_id, application_id, segment_id
    )
}
