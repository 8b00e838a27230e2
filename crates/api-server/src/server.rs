//! API server — HTTP surface for the scheduler and the export pipeline.

use crate::rest::{self, AppState};
use crate::{records_rest, workflow_rest};
use axum::routing::{get, post};
use axum::Router;
use reengage_core::config::AppConfig;
use reengage_export::RecordTransformer;
use reengage_workflow::ReengagementWorkflow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    workflow: Arc<ReengagementWorkflow>,
    transformer: Arc<RecordTransformer>,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        workflow: Arc<ReengagementWorkflow>,
        transformer: Arc<RecordTransformer>,
    ) -> Self {
        Self {
            config,
            workflow,
            transformer,
        }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let state = AppState {
            workflow: self.workflow.clone(),
            transformer: self.transformer.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        };

        Router::new()
            // Workflow steps
            .route(
                "/v1/workflows",
                post(workflow_rest::handle_create).get(workflow_rest::handle_list),
            )
            .route("/v1/workflows/:id", get(workflow_rest::handle_get))
            .route("/v1/workflows/:id/query", post(workflow_rest::handle_start_query))
            .route(
                "/v1/workflows/:id/query/check",
                post(workflow_rest::handle_check_query),
            )
            .route("/v1/workflows/:id/import", post(workflow_rest::handle_start_import))
            .route(
                "/v1/workflows/:id/import/check",
                post(workflow_rest::handle_check_import),
            )
            .route("/v1/workflows/:id/tag", post(workflow_rest::handle_tag))
            // Export pipeline
            .route("/v1/records/convert", post(records_rest::handle_convert))
            // Operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self.router();
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use reengage_connectors::Sandbox;
    use reengage_workflow::WorkflowStore;
    use serde_json::Value;
    use tower::ServiceExt;

    fn server() -> ApiServer {
        let mut config = AppConfig::default();
        config.sandbox.query_polls_until_complete = 0;
        config.sandbox.import_polls_until_complete = 0;

        let sandbox = Sandbox::from_config(&config);
        let workflow = Arc::new(ReengagementWorkflow::new(
            &config.workflow,
            sandbox.query_engine,
            sandbox.segment_service,
            Arc::new(WorkflowStore::new()),
        ));
        ApiServer::new(config, workflow, Arc::new(RecordTransformer::default()))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_workflow_steps_over_http() {
        let app = server().router();

        let (status, record) = call(&app, "POST", "/v1/workflows", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record["state"], "INIT");
        let id = record["id"].as_str().unwrap().to_string();

        let (status, started) = call(&app, "POST", &format!("/v1/workflows/{}/query", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["executionId"], "e1");
        assert_eq!(started["waitTime"], 1);

        let (_, check) = call(&app, "POST", &format!("/v1/workflows/{}/query/check", id), None).await;
        assert_eq!(check["status"], "succeeded");

        let (status, import) = call(&app, "POST", &format!("/v1/workflows/{}/import", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(import["importId"], "i1");

        let (_, check) = call(&app, "POST", &format!("/v1/workflows/{}/import/check", id), None).await;
        assert_eq!(check["status"], "succeeded");

        let (status, record) = call(&app, "POST", &format!("/v1/workflows/{}/tag", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["state"], "TAGGED");
    }

    #[tokio::test]
    async fn test_out_of_order_step_conflicts() {
        let app = server().router();
        let (_, record) = call(&app, "POST", "/v1/workflows", None).await;
        let id = record["id"].as_str().unwrap().to_string();

        let (status, body) = call(&app, "POST", &format!("/v1/workflows/{}/tag", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_transition");
    }

    #[tokio::test]
    async fn test_unknown_workflow_not_found() {
        let app = server().router();
        let uri = format!("/v1/workflows/{}", uuid::Uuid::new_v4());
        let (status, body) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "workflow_not_found");
    }

    #[tokio::test]
    async fn test_convert_endpoint_keeps_failed_records() {
        let app = server().router();
        let request = serde_json::json!({
            "invocationId": "inv-1",
            "records": [
                {"recordId": "a", "data": "eyJ4IjoxfQ=="},
                {"recordId": "b", "data": "bm90IGpzb24="}
            ]
        });

        let (status, body) = call(&app, "POST", "/v1/records/convert", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        let records = body["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["recordId"], "a");
        assert_eq!(records[0]["result"], "Ok");
        assert_eq!(records[0]["data"], "eyJ4IjoxfQo=");
        assert_eq!(records[1]["result"], "ProcessingFailed");
    }

    #[tokio::test]
    async fn test_health() {
        let app = server().router();
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
