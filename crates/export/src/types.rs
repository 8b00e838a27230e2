use serde::{Deserialize, Serialize};

/// A batch of records handed over by the delivery stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    pub records: Vec<InputRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    #[serde(alias = "id")]
    pub record_id: String,
    /// Base64 encoded payload.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approximate_arrival_timestamp: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordResult {
    Ok,
    ProcessingFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub record_id: String,
    pub result: RecordResult,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationResponse {
    pub records: Vec<OutputRecord>,
}

impl TransformationResponse {
    pub fn failed_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.result == RecordResult::ProcessingFailed)
            .count()
    }
}
