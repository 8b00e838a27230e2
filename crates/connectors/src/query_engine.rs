//! In-memory analytic query engine.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use reengage_core::types::{NamedQuery, QueryExecution, QueryState, StartQueryRequest};
use reengage_core::{QueryEngine, ReengageError, ReengageResult};
use tracing::debug;

use crate::failure::FailureInjector;

const SERVICE: &str = "query_engine";

struct SandboxExecution {
    request: StartQueryRequest,
    polls_remaining: u32,
    final_state: QueryState,
    reason: Option<String>,
}

/// Executions report `RUNNING` for `polls_until_complete` status reads,
/// then their final state.
pub struct InMemoryQueryEngine {
    named_queries: DashMap<String, NamedQuery>,
    executions: DashMap<String, SandboxExecution>,
    next_id: AtomicU64,
    polls_until_complete: u32,
    pub failures: FailureInjector,
}

impl InMemoryQueryEngine {
    pub fn new(polls_until_complete: u32) -> Self {
        Self {
            named_queries: DashMap::new(),
            executions: DashMap::new(),
            next_id: AtomicU64::new(1),
            polls_until_complete,
            failures: FailureInjector::new(),
        }
    }

    pub fn register_named_query(&self, query: NamedQuery) {
        self.named_queries.insert(query.id.clone(), query);
    }

    /// Force an execution to end in `FAILED` once its polls run out.
    pub fn fail_execution(&self, execution_id: &str, reason: impl Into<String>) -> bool {
        match self.executions.get_mut(execution_id) {
            Some(mut execution) => {
                execution.final_state = QueryState::Failed;
                execution.reason = Some(reason.into());
                true
            }
            None => false,
        }
    }

    /// Request an execution was started with.
    pub fn execution_request(&self, execution_id: &str) -> Option<StartQueryRequest> {
        self.executions
            .get(execution_id)
            .map(|e| e.value().request.clone())
    }

    pub fn execution_count(&self) -> usize {
        self.executions.len()
    }
}

#[async_trait]
impl QueryEngine for InMemoryQueryEngine {
    async fn get_named_query(&self, named_query_id: &str) -> ReengageResult<NamedQuery> {
        self.failures.check(SERVICE, "get_named_query")?;
        self.named_queries
            .get(named_query_id)
            .map(|q| q.value().clone())
            .ok_or_else(|| {
                ReengageError::service(
                    SERVICE,
                    "get_named_query",
                    format!("named query {} does not exist", named_query_id),
                )
            })
    }

    async fn start_query_execution(&self, request: StartQueryRequest) -> ReengageResult<String> {
        self.failures.check(SERVICE, "start_query_execution")?;
        if !request.output_location.starts_with("s3://") {
            return Err(ReengageError::service(
                SERVICE,
                "start_query_execution",
                format!("invalid output location {}", request.output_location),
            ));
        }

        let id = format!("e{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(execution_id = %id, database = %request.database, "sandbox query started");
        self.executions.insert(
            id.clone(),
            SandboxExecution {
                request,
                polls_remaining: self.polls_until_complete,
                final_state: QueryState::Succeeded,
                reason: None,
            },
        );
        Ok(id)
    }

    async fn get_query_execution(&self, execution_id: &str) -> ReengageResult<QueryExecution> {
        self.failures.check(SERVICE, "get_query_execution")?;
        let mut execution = self.executions.get_mut(execution_id).ok_or_else(|| {
            ReengageError::service(
                SERVICE,
                "get_query_execution",
                format!("execution {} does not exist", execution_id),
            )
        })?;

        if execution.polls_remaining > 0 {
            execution.polls_remaining -= 1;
            return Ok(QueryExecution {
                id: execution_id.to_string(),
                state: QueryState::Running,
                output_location: None,
                state_change_reason: None,
            });
        }

        let output_location = match execution.final_state {
            QueryState::Succeeded => Some(format!(
                "{}{}.csv",
                execution.request.output_location, execution_id
            )),
            _ => None,
        };
        Ok(QueryExecution {
            id: execution_id.to_string(),
            state: execution.final_state,
            output_location,
            state_change_reason: execution.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(polls: u32) -> InMemoryQueryEngine {
        let engine = InMemoryQueryEngine::new(polls);
        engine.register_named_query(NamedQuery {
            id: "Q1".to_string(),
            name: "unengaged".to_string(),
            query_string: "SELECT 1".to_string(),
            database: "D1".to_string(),
        });
        engine
    }

    fn request() -> StartQueryRequest {
        StartQueryRequest {
            query_string: "SELECT 1".to_string(),
            database: "D1".to_string(),
            output_location: "s3://bucket/out/".to_string(),
        }
    }

    #[tokio::test]
    async fn test_execution_runs_then_succeeds() {
        let engine = engine(2);
        let id = engine.start_query_execution(request()).await.unwrap();
        assert_eq!(id, "e1");

        for _ in 0..2 {
            let execution = engine.get_query_execution(&id).await.unwrap();
            assert_eq!(execution.state, QueryState::Running);
        }
        let execution = engine.get_query_execution(&id).await.unwrap();
        assert_eq!(execution.state, QueryState::Succeeded);
        assert_eq!(execution.output_location.as_deref(), Some("s3://bucket/out/e1.csv"));
    }

    #[tokio::test]
    async fn test_failed_execution_has_reason() {
        let engine = engine(0);
        let id = engine.start_query_execution(request()).await.unwrap();
        assert!(engine.fail_execution(&id, "syntax error"));

        let execution = engine.get_query_execution(&id).await.unwrap();
        assert_eq!(execution.state, QueryState::Failed);
        assert!(execution.output_location.is_none());
        assert_eq!(execution.state_change_reason.as_deref(), Some("syntax error"));
    }

    #[tokio::test]
    async fn test_unknown_named_query() {
        let engine = engine(0);
        let err = engine.get_named_query("missing").await.unwrap_err();
        assert!(err.is_service());
    }
}
