//! Record transformer: decode, canonicalize, newline-terminate, re-encode.
//!
//! Every input record yields exactly one output record at the same position.
//! A malformed payload only fails its own record.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reengage_core::{ReengageError, ReengageResult};
use tracing::{debug, warn};

use crate::types::{
    InputRecord, OutputRecord, RecordResult, TransformationRequest, TransformationResponse,
};

/// Line delimiter expected by the downstream sink.
const RECORD_DELIMITER: char = '\n';

/// Stateless converter for delivery-stream batches.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    max_batch_records: usize,
}

impl Default for RecordTransformer {
    fn default() -> Self {
        Self::new(500)
    }
}

impl RecordTransformer {
    pub fn new(max_batch_records: usize) -> Self {
        Self { max_batch_records }
    }

    /// Convert one batch, preserving record count and order.
    pub fn convert(&self, request: &TransformationRequest) -> TransformationResponse {
        if request.records.len() > self.max_batch_records {
            warn!(
                records = request.records.len(),
                limit = self.max_batch_records,
                "transformation batch exceeds advisory size"
            );
        }

        let records: Vec<OutputRecord> = request
            .records
            .iter()
            .map(|record| self.convert_record(record))
            .collect();

        let failed = records
            .iter()
            .filter(|r| r.result == RecordResult::ProcessingFailed)
            .count();
        metrics::counter!("export.batches").increment(1);
        metrics::counter!("export.records_ok").increment((records.len() - failed) as u64);
        metrics::counter!("export.records_failed").increment(failed as u64);
        debug!(
            invocation_id = request.invocation_id.as_deref().unwrap_or("-"),
            total = records.len(),
            failed,
            "converted transformation batch"
        );

        TransformationResponse { records }
    }

    fn convert_record(&self, record: &InputRecord) -> OutputRecord {
        match transform_payload(&record.record_id, &record.data) {
            Ok(data) => OutputRecord {
                record_id: record.record_id.clone(),
                result: RecordResult::Ok,
                data,
            },
            Err(e) => {
                warn!(record_id = %record.record_id, error = %e, "record processing failed");
                OutputRecord {
                    record_id: record.record_id.clone(),
                    result: RecordResult::ProcessingFailed,
                    data: record.data.clone(),
                }
            }
        }
    }
}

/// Largest magnitude at which every integer is exactly representable as f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Canonical compact JSON form of `text`: no whitespace, object keys sorted,
/// integral floats written as integers.
pub fn canonicalize(text: &str) -> Result<String, serde_json::Error> {
    let mut value: serde_json::Value = serde_json::from_str(text)?;
    normalize_numbers(&mut value);
    serde_json::to_string(&value)
}

fn normalize_numbers(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Number(n) if n.is_f64() => {
            let f = n.as_f64().unwrap_or(f64::NAN);
            if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
                *n = serde_json::Number::from(f as i64);
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(normalize_numbers),
        serde_json::Value::Object(map) => map.values_mut().for_each(normalize_numbers),
        _ => {}
    }
}

/// Transform a single base64 payload into its delimited, re-encoded form.
pub fn transform_payload(record_id: &str, encoded: &str) -> ReengageResult<String> {
    let failed = |reason: String| ReengageError::RecordProcessing {
        record_id: record_id.to_string(),
        reason,
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| failed(format!("invalid base64: {}", e)))?;
    let text = String::from_utf8(bytes).map_err(|e| failed(format!("invalid utf-8: {}", e)))?;
    let mut canonical = canonicalize(&text).map_err(|e| failed(format!("invalid json: {}", e)))?;
    canonical.push(RECORD_DELIMITER);

    Ok(STANDARD.encode(canonical.as_bytes()))
}
