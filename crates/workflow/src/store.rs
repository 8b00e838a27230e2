//! Workflow records — the persisted "current state + handles" the external
//! scheduler inspects between invocations.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reengage_core::{ReengageError, ReengageResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::WorkflowState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub id: Uuid,
    pub state: WorkflowState,
    pub execution_id: Option<String>,
    pub output_location: Option<String>,
    pub import_id: Option<String>,
    pub segment_id: Option<String>,
    pub external_id: Option<String>,
    pub wait_time: Option<u64>,
    pub last_error: Option<String>,
    /// Transition claimed by an invocation that is still talking to a service.
    #[serde(default)]
    pub step_in_progress: Option<WorkflowState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRecord {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: WorkflowState::Init,
            execution_id: None,
            output_location: None,
            import_id: None,
            segment_id: None,
            external_id: None,
            wait_time: None,
            last_error: None,
            step_in_progress: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for WorkflowRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Concurrent in-process store of workflow records.
pub struct WorkflowStore {
    records: DashMap<Uuid, WorkflowRecord>,
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn insert(&self, record: WorkflowRecord) {
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: Uuid) -> ReengageResult<WorkflowRecord> {
        self.records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ReengageError::WorkflowNotFound(id.to_string()))
    }

    /// Apply `f` to a copy of the record under its entry lock; the copy
    /// replaces the stored record only when `f` succeeds.
    pub fn update<F>(&self, id: Uuid, f: F) -> ReengageResult<WorkflowRecord>
    where
        F: FnOnce(&mut WorkflowRecord) -> ReengageResult<()>,
    {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or_else(|| ReengageError::WorkflowNotFound(id.to_string()))?;
        let mut record = entry.value().clone();
        f(&mut record)?;
        record.updated_at = Utc::now();
        *entry.value_mut() = record;
        Ok(entry.value().clone())
    }

    /// All records, oldest first.
    pub fn list(&self) -> Vec<WorkflowRecord> {
        let mut records: Vec<WorkflowRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_update() {
        let store = WorkflowStore::new();
        let record = WorkflowRecord::new();
        let id = record.id;
        store.insert(record);

        let updated = store
            .update(id, |r| {
                r.state = WorkflowState::QueryStarted;
                r.execution_id = Some("e1".to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.state, WorkflowState::QueryStarted);
        assert_eq!(store.get(id).unwrap().execution_id.as_deref(), Some("e1"));
        assert!(updated.updated_at >= updated.created_at);
    }

    #[test]
    fn test_missing_record() {
        let store = WorkflowStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id), Err(ReengageError::WorkflowNotFound(_))));
        assert!(store.update(id, |_| Ok(())).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_update_leaves_record_untouched() {
        let store = WorkflowStore::new();
        let record = WorkflowRecord::new();
        let id = record.id;
        store.insert(record.clone());

        let result = store.update(id, |r| {
            r.execution_id = Some("e1".to_string());
            Err(ReengageError::Config("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(store.get(id).unwrap(), record);
    }

    #[test]
    fn test_record_wire_format() {
        let record = WorkflowRecord::new();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "INIT");
        assert!(json.get("executionId").is_some());
        assert!(json.get("lastError").is_some());
    }
}
