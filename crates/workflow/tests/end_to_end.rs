//! Full re-engagement flow against the sandbox connectors.

use std::collections::HashMap;
use std::sync::Arc;

use reengage_connectors::{InMemoryQueryEngine, InMemorySegmentService};
use reengage_core::config::{AmbiguityPolicy, WorkflowConfig};
use reengage_core::types::{NamedQuery, QueryState, Segment, SegmentType};
use reengage_core::{QueryEngine, ReengageError};
use reengage_workflow::{
    ImportStarted, QueryLauncher, QueryStarted, ReengagementWorkflow, SegmentImportInitiator,
    SegmentResolver, SegmentTagger, StepStatus, WorkflowState, WorkflowStore,
};

const APP: &str = "app-1";

fn query_engine() -> Arc<InMemoryQueryEngine> {
    let engine = Arc::new(InMemoryQueryEngine::new(0));
    engine.register_named_query(NamedQuery {
        id: "Q1".to_string(),
        name: "unengaged".to_string(),
        query_string: "SELECT endpoint_id FROM activity WHERE days_inactive > 30".to_string(),
        database: "D1".to_string(),
    });
    engine
}

fn segment_service() -> Arc<InMemorySegmentService> {
    Arc::new(InMemorySegmentService::new(
        "us-east-1".to_string(),
        "ext1".to_string(),
        0,
    ))
}

fn reengagement_segment(id: &str) -> Segment {
    let mut tags = HashMap::new();
    tags.insert("REENGAGEMENT".to_string(), "YES".to_string());
    Segment {
        id: id.to_string(),
        name: "UnEngaged Users".to_string(),
        external_id: Some("ext1".to_string()),
        segment_type: SegmentType::Import,
        tags,
    }
}

fn workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        region: "us-east-1".to_string(),
        application_id: APP.to_string(),
        role_arn: "arn:aws:iam::1:role/import".to_string(),
        named_query_id: "Q1".to_string(),
        export_bucket: "bucket/out".to_string(),
        segment_name: "UnEngaged Users".to_string(),
        wait_time_secs: 1,
        ambiguity_policy: AmbiguityPolicy::FirstMatch,
    }
}

#[tokio::test]
async fn test_components_chain_with_existing_segment() {
    let engine = query_engine();
    let segments = segment_service();
    segments.add_segment(
        APP,
        Segment {
            id: "d1".to_string(),
            name: "All Users".to_string(),
            external_id: None,
            segment_type: SegmentType::Dimensional,
            tags: HashMap::new(),
        },
    );
    segments.add_segment(APP, reengagement_segment("s1"));

    let launcher = QueryLauncher::new(engine.clone(), "Q1", "s3://bucket/out/", 1);
    let started = launcher.start().await.unwrap();
    assert_eq!(
        started,
        QueryStarted {
            execution_id: "e1".to_string(),
            wait_time: 1
        }
    );
    let execution = engine.get_query_execution("e1").await.unwrap();
    assert_eq!(execution.state, QueryState::Succeeded);

    let initiator = SegmentImportInitiator::new(
        segments.clone(),
        SegmentResolver::default(),
        APP,
        "arn:aws:iam::1:role/import",
        "UnEngaged Users",
        1,
    );
    let import = initiator.start("s3://bucket/out/", None).await.unwrap();
    assert_eq!(
        import,
        ImportStarted {
            import_id: "i1".to_string(),
            segment_id: "s1".to_string(),
            external_id: "ext1".to_string(),
            wait_time: 1,
        }
    );

    let tagger = SegmentTagger::new(segments.clone(), "us-east-1", APP);
    tagger.apply("ext1", "s1").await.unwrap();
    let tagged = segments.segment(APP, "s1").unwrap();
    assert_eq!(tagged.tags.get("REENGAGEMENT").map(String::as_str), Some("YES"));
}

#[tokio::test]
async fn test_orchestrated_flow_defines_then_reuses_segment() {
    let engine = query_engine();
    let segments = segment_service();
    let workflow = ReengagementWorkflow::new(
        &workflow_config(),
        engine.clone(),
        segments.clone(),
        Arc::new(WorkflowStore::new()),
    );

    // first cycle: no tagged segment yet, a new one is defined
    let id = workflow.create().id;
    workflow.start_query(id).await.unwrap();
    assert_eq!(workflow.check_query(id).await.unwrap(), StepStatus::Succeeded);
    let first = workflow.start_import(id).await.unwrap();
    assert_eq!(segments.import_requests()[0].define_segment, Some(true));
    assert_eq!(workflow.check_import(id).await.unwrap(), StepStatus::Succeeded);
    let record = workflow.tag(id).await.unwrap();
    assert_eq!(record.state, WorkflowState::Tagged);
    assert!(segments
        .segment(APP, &first.segment_id)
        .unwrap()
        .is_reengagement_import());

    // second cycle: the tagged segment is found and refreshed in place
    let id = workflow.create().id;
    workflow.start_query(id).await.unwrap();
    workflow.check_query(id).await.unwrap();
    let second = workflow.start_import(id).await.unwrap();
    assert_eq!(second.segment_id, first.segment_id);
    let requests = segments.import_requests();
    let request = &requests[1];
    assert_eq!(request.segment_id.as_deref(), Some(first.segment_id.as_str()));
    assert_eq!(request.define_segment, None);
    assert_eq!(request.s3_url, "s3://bucket/out/e2.csv");

    assert_eq!(workflow.list().len(), 2);
}

#[tokio::test]
async fn test_reject_policy_halts_on_duplicate_segments() {
    let engine = query_engine();
    let segments = segment_service();
    segments.add_segment(APP, reengagement_segment("s1"));
    segments.add_segment(APP, reengagement_segment("s2"));

    let mut config = workflow_config();
    config.ambiguity_policy = AmbiguityPolicy::Reject;
    let workflow = ReengagementWorkflow::new(
        &config,
        engine,
        segments.clone(),
        Arc::new(WorkflowStore::new()),
    );

    let id = workflow.create().id;
    workflow.start_query(id).await.unwrap();
    workflow.check_query(id).await.unwrap();

    let err = workflow.start_import(id).await.unwrap_err();
    assert!(matches!(err, ReengageError::ResolutionAmbiguity { .. }));
    assert_eq!(segments.import_count(), 0);

    let record = workflow.get(id).unwrap();
    assert_eq!(record.state, WorkflowState::QuerySucceeded);
    assert!(record.last_error.unwrap().contains("s1, s2"));
}
