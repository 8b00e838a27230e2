use serde::{Deserialize, Serialize};

/// Result of starting a query execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStarted {
    pub execution_id: String,
    pub wait_time: u64,
}

/// Result of starting an import job, read from the job definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStarted {
    pub import_id: String,
    pub segment_id: String,
    pub external_id: String,
    pub wait_time: u64,
}

/// Outcome of a single completion check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Pending {
        #[serde(rename = "waitTime")]
        wait_time: u64,
    },
    Succeeded,
    Failed { reason: String },
}
