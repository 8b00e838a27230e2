use std::sync::Arc;

use reengage_core::types::StartQueryRequest;
use reengage_core::{QueryEngine, ReengageResult};
use tracing::info;

use crate::types::QueryStarted;

/// Starts one execution of the configured named query.
pub struct QueryLauncher {
    engine: Arc<dyn QueryEngine>,
    named_query_id: String,
    output_location: String,
    wait_time: u64,
}

impl QueryLauncher {
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        named_query_id: impl Into<String>,
        output_location: impl Into<String>,
        wait_time: u64,
    ) -> Self {
        Self {
            engine,
            named_query_id: named_query_id.into(),
            output_location: output_location.into(),
            wait_time,
        }
    }

    /// Look up the named query and start it. Engine errors are returned as-is.
    pub async fn start(&self) -> ReengageResult<QueryStarted> {
        let named = self.engine.get_named_query(&self.named_query_id).await?;

        let execution_id = self
            .engine
            .start_query_execution(StartQueryRequest {
                query_string: named.query_string,
                database: named.database.clone(),
                output_location: self.output_location.clone(),
            })
            .await?;

        metrics::counter!("workflow.queries_started").increment(1);
        info!(
            named_query_id = %self.named_query_id,
            database = %named.database,
            execution_id = %execution_id,
            "query execution started"
        );

        Ok(QueryStarted {
            execution_id,
            wait_time: self.wait_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reengage_connectors::InMemoryQueryEngine;
    use reengage_core::types::NamedQuery;

    fn engine() -> Arc<InMemoryQueryEngine> {
        let engine = Arc::new(InMemoryQueryEngine::new(0));
        engine.register_named_query(NamedQuery {
            id: "Q1".to_string(),
            name: "unengaged".to_string(),
            query_string: "SELECT user_id FROM activity".to_string(),
            database: "D1".to_string(),
        });
        engine
    }

    #[tokio::test]
    async fn test_start_uses_named_query_text_and_database() {
        let engine = engine();
        let launcher = QueryLauncher::new(engine.clone(), "Q1", "s3://bucket/out/", 1);

        let started = launcher.start().await.unwrap();
        assert_eq!(
            started,
            QueryStarted {
                execution_id: "e1".to_string(),
                wait_time: 1
            }
        );

        let request = engine.execution_request("e1").unwrap();
        assert_eq!(request.query_string, "SELECT user_id FROM activity");
        assert_eq!(request.database, "D1");
        assert_eq!(request.output_location, "s3://bucket/out/");
    }

    #[tokio::test]
    async fn test_lookup_failure_surfaces_unchanged() {
        let engine = engine();
        let launcher = QueryLauncher::new(engine.clone(), "missing", "s3://bucket/out/", 1);

        let err = launcher.start().await.unwrap_err();
        assert!(err.is_service());
        assert_eq!(engine.execution_count(), 0);
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_unchanged() {
        let engine = engine();
        engine.failures.inject("start_query_execution", "throttled");
        let launcher = QueryLauncher::new(engine.clone(), "Q1", "s3://bucket/out/", 1);

        let err = launcher.start().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "query_engine start_query_execution failed: throttled"
        );
    }
}
