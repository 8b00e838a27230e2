//! Sandbox connectors — in-memory query engine and segment service that
//! honor the same request/response contracts as the hosted services.
//! Used for local runs and tests.

pub mod failure;
pub mod query_engine;
pub mod segment_service;

use std::sync::Arc;

use reengage_core::types::NamedQuery;
use reengage_core::AppConfig;
use tracing::info;

pub use failure::FailureInjector;
pub use query_engine::InMemoryQueryEngine;
pub use segment_service::InMemorySegmentService;

/// Sandbox connectors seeded from configuration.
pub struct Sandbox {
    pub query_engine: Arc<InMemoryQueryEngine>,
    pub segment_service: Arc<InMemorySegmentService>,
}

impl Sandbox {
    /// Build connectors and register the configured named query.
    pub fn from_config(config: &AppConfig) -> Self {
        let query_engine = Arc::new(InMemoryQueryEngine::new(
            config.sandbox.query_polls_until_complete,
        ));
        query_engine.register_named_query(NamedQuery {
            id: config.workflow.named_query_id.clone(),
            name: "unengaged-users".to_string(),
            query_string: config.sandbox.query_string.clone(),
            database: config.sandbox.database.clone(),
        });

        let segment_service = Arc::new(InMemorySegmentService::new(
            config.workflow.region.clone(),
            config.sandbox.external_id.clone(),
            config.sandbox.import_polls_until_complete,
        ));

        info!(
            named_query_id = %config.workflow.named_query_id,
            application_id = %config.workflow.application_id,
            "sandbox connectors seeded"
        );

        Self {
            query_engine,
            segment_service,
        }
    }
}
