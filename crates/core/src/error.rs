use thiserror::Error;

pub type ReengageResult<T> = Result<T, ReengageError>;

#[derive(Error, Debug)]
pub enum ReengageError {
    /// Failure returned by the query engine or the segment service.
    #[error("{service} {operation} failed: {message}")]
    Service {
        service: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("Record {record_id} could not be processed: {reason}")]
    RecordProcessing { record_id: String, reason: String },

    #[error("Application {application_id} has {} re-engagement import segments: {}", matches.len(), matches.join(", "))]
    ResolutionAmbiguity {
        application_id: String,
        matches: Vec<String>,
    },

    #[error("Import {import_id} already exists for execution {execution_id}")]
    DuplicateImport {
        execution_id: String,
        import_id: String,
    },

    #[error("Invalid workflow transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Workflow {workflow_id} already has step {step} in progress")]
    StepInProgress { workflow_id: String, step: String },

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ReengageError {
    pub fn service(
        service: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        ReengageError::Service {
            service,
            operation,
            message: message.into(),
        }
    }

    /// Whether the error originated in an external service call.
    pub fn is_service(&self) -> bool {
        matches!(self, ReengageError::Service { .. })
    }
}
