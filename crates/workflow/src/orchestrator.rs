//! Workflow orchestrator — runs one step per invocation against the persisted
//! workflow record.
//!
//! Every operation performs at most a couple of service calls and returns.
//! Completion is observed through `check_query` / `check_import`, which the
//! scheduler calls again after the returned wait time.

use std::sync::Arc;

use anyhow::anyhow;
use reengage_core::config::WorkflowConfig;
use reengage_core::types::{ImportJobState, QueryState};
use reengage_core::{QueryEngine, ReengageError, ReengageResult, SegmentService};
use tracing::{error, info};
use uuid::Uuid;

use crate::importer::SegmentImportInitiator;
use crate::launcher::QueryLauncher;
use crate::resolver::SegmentResolver;
use crate::state_machine::{WorkflowState, WorkflowStateMachine};
use crate::store::{WorkflowRecord, WorkflowStore};
use crate::tagger::SegmentTagger;
use crate::types::{ImportStarted, QueryStarted, StepStatus};

pub struct ReengagementWorkflow {
    query_engine: Arc<dyn QueryEngine>,
    segment_service: Arc<dyn SegmentService>,
    launcher: QueryLauncher,
    importer: SegmentImportInitiator,
    tagger: SegmentTagger,
    store: Arc<WorkflowStore>,
    application_id: String,
    wait_time: u64,
}

impl ReengagementWorkflow {
    pub fn new(
        config: &WorkflowConfig,
        query_engine: Arc<dyn QueryEngine>,
        segment_service: Arc<dyn SegmentService>,
        store: Arc<WorkflowStore>,
    ) -> Self {
        let launcher = QueryLauncher::new(
            query_engine.clone(),
            config.named_query_id.clone(),
            config.output_location(),
            config.wait_time_secs,
        );
        let importer = SegmentImportInitiator::new(
            segment_service.clone(),
            SegmentResolver::new(config.ambiguity_policy),
            config.application_id.clone(),
            config.role_arn.clone(),
            config.segment_name.clone(),
            config.wait_time_secs,
        );
        let tagger = SegmentTagger::new(
            segment_service.clone(),
            config.region.clone(),
            config.application_id.clone(),
        );

        Self {
            query_engine,
            segment_service,
            launcher,
            importer,
            tagger,
            store,
            application_id: config.application_id.clone(),
            wait_time: config.wait_time_secs,
        }
    }

    /// Register a new workflow in `INIT`.
    pub fn create(&self) -> WorkflowRecord {
        let record = WorkflowRecord::new();
        self.store.insert(record.clone());
        info!(workflow_id = %record.id, "workflow created");
        record
    }

    pub fn get(&self, id: Uuid) -> ReengageResult<WorkflowRecord> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<WorkflowRecord> {
        self.store.list()
    }

    /// INIT → QUERY_STARTED.
    pub async fn start_query(&self, id: Uuid) -> ReengageResult<QueryStarted> {
        self.claim(id, WorkflowState::Init, WorkflowState::QueryStarted)?;

        let started = self.step(id, self.launcher.start()).await?;

        self.advance(id, WorkflowState::QueryStarted, |r| {
            r.execution_id = Some(started.execution_id.clone());
            r.wait_time = Some(started.wait_time);
        })?;
        Ok(started)
    }

    /// Poll the query execution once; QUERY_STARTED → QUERY_SUCCEEDED on success.
    pub async fn check_query(&self, id: Uuid) -> ReengageResult<StepStatus> {
        let record = self.store.get(id)?;
        if record.state >= WorkflowState::QuerySucceeded {
            return Ok(StepStatus::Succeeded);
        }
        WorkflowStateMachine::resume(record.state)
            .require(WorkflowState::QueryStarted, WorkflowState::QuerySucceeded)?;
        let execution_id = handle(&record.execution_id, "execution id")?;

        let execution = self
            .step(id, self.query_engine.get_query_execution(&execution_id))
            .await?;

        match execution.state {
            QueryState::Queued | QueryState::Running => Ok(StepStatus::Pending {
                wait_time: self.wait_time,
            }),
            QueryState::Succeeded => {
                let Some(output_location) = execution.output_location else {
                    let err = ReengageError::service(
                        "query_engine",
                        "get_query_execution",
                        format!("execution {} succeeded without output location", execution_id),
                    );
                    self.record_failure(id, &err.to_string());
                    return Err(err);
                };
                info!(
                    workflow_id = %id,
                    execution_id = %execution_id,
                    output_location = %output_location,
                    "query execution succeeded"
                );
                self.advance(id, WorkflowState::QuerySucceeded, |r| {
                    r.output_location = Some(output_location.clone());
                })?;
                Ok(StepStatus::Succeeded)
            }
            QueryState::Failed | QueryState::Cancelled => {
                let reason = format!(
                    "query execution {} ended {:?}: {}",
                    execution_id,
                    execution.state,
                    execution.state_change_reason.unwrap_or_default()
                );
                self.record_failure(id, &reason);
                Ok(StepStatus::Failed { reason })
            }
        }
    }

    /// QUERY_SUCCEEDED → IMPORT_STARTED.
    ///
    /// The execution id is sent as the import's idempotency key. A repeated
    /// call while the import is in flight returns the existing handles; a
    /// call after the import finished is rejected as a duplicate.
    pub async fn start_import(&self, id: Uuid) -> ReengageResult<ImportStarted> {
        let record = self.store.get(id)?;
        let execution_id = record.execution_id.clone();

        if record.state >= WorkflowState::ImportStarted {
            if let (Some(import_id), Some(execution_id)) = (&record.import_id, &execution_id) {
                if record.state > WorkflowState::ImportStarted {
                    return Err(ReengageError::DuplicateImport {
                        execution_id: execution_id.clone(),
                        import_id: import_id.clone(),
                    });
                }
                metrics::counter!("workflow.imports_deduplicated").increment(1);
                info!(workflow_id = %id, import_id = %import_id, "import already started");
                return Ok(ImportStarted {
                    import_id: import_id.clone(),
                    segment_id: record.segment_id.clone().unwrap_or_default(),
                    external_id: record.external_id.clone().unwrap_or_default(),
                    wait_time: record.wait_time.unwrap_or(self.wait_time),
                });
            }
        }
        let record = self.claim(id, WorkflowState::QuerySucceeded, WorkflowState::ImportStarted)?;
        let output_location =
            self.release_on_err(id, handle(&record.output_location, "output location"))?;

        let started = self
            .step(
                id,
                self.importer.start(&output_location, execution_id.as_deref()),
            )
            .await?;

        self.advance(id, WorkflowState::ImportStarted, |r| {
            r.import_id = Some(started.import_id.clone());
            r.segment_id = Some(started.segment_id.clone());
            r.external_id = Some(started.external_id.clone());
            r.wait_time = Some(started.wait_time);
        })?;
        Ok(started)
    }

    /// Poll the import job once; IMPORT_STARTED → IMPORT_SUCCEEDED on completion.
    pub async fn check_import(&self, id: Uuid) -> ReengageResult<StepStatus> {
        let record = self.store.get(id)?;
        if record.state >= WorkflowState::ImportSucceeded {
            return Ok(StepStatus::Succeeded);
        }
        WorkflowStateMachine::resume(record.state)
            .require(WorkflowState::ImportStarted, WorkflowState::ImportSucceeded)?;
        let import_id = handle(&record.import_id, "import id")?;

        let job = self
            .step(
                id,
                self.segment_service
                    .get_import_job(&self.application_id, &import_id),
            )
            .await?;

        match job.state {
            ImportJobState::Completed => {
                info!(workflow_id = %id, import_id = %import_id, "segment import completed");
                self.advance(id, WorkflowState::ImportSucceeded, |_| {})?;
                Ok(StepStatus::Succeeded)
            }
            ImportJobState::Failed => {
                let reason = format!(
                    "import job {} failed: {}",
                    import_id,
                    job.failures.join("; ")
                );
                self.record_failure(id, &reason);
                Ok(StepStatus::Failed { reason })
            }
            _ => Ok(StepStatus::Pending {
                wait_time: self.wait_time,
            }),
        }
    }

    /// IMPORT_SUCCEEDED → TAGGED.
    pub async fn tag(&self, id: Uuid) -> ReengageResult<WorkflowRecord> {
        let record = self.claim(id, WorkflowState::ImportSucceeded, WorkflowState::Tagged)?;
        let external_id = self.release_on_err(id, handle(&record.external_id, "external id"))?;
        let segment_id = self.release_on_err(id, handle(&record.segment_id, "segment id"))?;

        self.step(id, self.tagger.apply(&external_id, &segment_id))
            .await?;

        self.advance(id, WorkflowState::Tagged, |_| {})
    }

    /// Reserve the `from → to` transition so a concurrent invocation of the
    /// same step fails fast instead of issuing a second service call.
    fn claim(
        &self,
        id: Uuid,
        from: WorkflowState,
        to: WorkflowState,
    ) -> ReengageResult<WorkflowRecord> {
        self.store.update(id, |r| {
            WorkflowStateMachine::resume(r.state).require(from, to)?;
            if let Some(step) = r.step_in_progress {
                return Err(ReengageError::StepInProgress {
                    workflow_id: id.to_string(),
                    step: step.to_string(),
                });
            }
            r.step_in_progress = Some(to);
            Ok(())
        })
    }

    fn release_on_err<T>(&self, id: Uuid, result: ReengageResult<T>) -> ReengageResult<T> {
        if let Err(e) = &result {
            self.record_failure(id, &e.to_string());
        }
        result
    }

    /// Await a step, recording its error on the workflow before returning it.
    async fn step<T, F>(&self, id: Uuid, fut: F) -> ReengageResult<T>
    where
        F: std::future::Future<Output = ReengageResult<T>>,
    {
        match fut.await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.record_failure(id, &e.to_string());
                Err(e)
            }
        }
    }

    fn advance<F>(&self, id: Uuid, to: WorkflowState, f: F) -> ReengageResult<WorkflowRecord>
    where
        F: FnOnce(&mut WorkflowRecord),
    {
        self.store.update(id, |r| {
            let mut machine = WorkflowStateMachine::resume(r.state);
            machine.transition(to)?;
            r.state = machine.state;
            r.last_error = None;
            r.step_in_progress = None;
            f(r);
            Ok(())
        })
    }

    fn record_failure(&self, id: Uuid, reason: &str) {
        metrics::counter!("workflow.step_failures").increment(1);
        error!(workflow_id = %id, error = %reason, "workflow step failed");
        let result = self.store.update(id, |r| {
            r.last_error = Some(reason.to_string());
            r.step_in_progress = None;
            Ok(())
        });
        if let Err(e) = result {
            error!(workflow_id = %id, error = %e, "failed to record step failure");
        }
    }
}

fn handle(value: &Option<String>, name: &str) -> ReengageResult<String> {
    value
        .clone()
        .ok_or_else(|| ReengageError::Internal(anyhow!("workflow record has no {}", name)))
}
