use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `REENGAGE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            workflow: WorkflowConfig::default(),
            export: ExportConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

// ─── Workflow Config ────────────────────────────────────────────────────

/// How the segment resolver treats more than one tagged import segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Use the first match in service order and log the rest.
    #[default]
    FirstMatch,
    /// Fail the step with a resolution ambiguity error.
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_application_id")]
    pub application_id: String,
    #[serde(default = "default_role_arn")]
    pub role_arn: String,
    #[serde(default = "default_named_query_id")]
    pub named_query_id: String,
    #[serde(default = "default_export_bucket")]
    pub export_bucket: String,
    #[serde(default = "default_segment_name")]
    pub segment_name: String,
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: u64,
    #[serde(default)]
    pub ambiguity_policy: AmbiguityPolicy,
}

fn default_region() -> String { "us-east-1".to_string() }
fn default_application_id() -> String { "reengage-app".to_string() }
fn default_role_arn() -> String { "arn:aws:iam::000000000000:role/reengage-import".to_string() }
fn default_named_query_id() -> String { "unengaged-users".to_string() }
fn default_export_bucket() -> String { "reengage-export".to_string() }
fn default_segment_name() -> String { "UnEngaged Users".to_string() }
fn default_wait_time_secs() -> u64 { 1 }

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            application_id: default_application_id(),
            role_arn: default_role_arn(),
            named_query_id: default_named_query_id(),
            export_bucket: default_export_bucket(),
            segment_name: default_segment_name(),
            wait_time_secs: default_wait_time_secs(),
            ambiguity_policy: AmbiguityPolicy::default(),
        }
    }
}

impl WorkflowConfig {
    /// Query result location handed to the query engine.
    pub fn output_location(&self) -> String {
        format!("s3://{}/", self.export_bucket.trim_end_matches('/'))
    }

    /// Reject configurations the workflow cannot run with.
    pub fn validate(&self) -> Result<(), crate::ReengageError> {
        let required = [
            ("region", &self.region),
            ("application_id", &self.application_id),
            ("role_arn", &self.role_arn),
            ("named_query_id", &self.named_query_id),
            ("export_bucket", &self.export_bucket),
            ("segment_name", &self.segment_name),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(crate::ReengageError::Config(format!(
                    "workflow.{} must not be empty",
                    name
                )));
            }
        }
        Ok(())
    }
}

// ─── Export Config ──────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_max_batch_records")]
    pub max_batch_records: usize,
}

fn default_max_batch_records() -> usize { 500 }

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_batch_records: default_max_batch_records(),
        }
    }
}

// ─── Sandbox Config ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_query_polls")]
    pub query_polls_until_complete: u32,
    #[serde(default = "default_import_polls")]
    pub import_polls_until_complete: u32,
    #[serde(default = "default_external_id")]
    pub external_id: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_query_string")]
    pub query_string: String,
}

fn default_query_polls() -> u32 { 1 }
fn default_import_polls() -> u32 { 1 }
fn default_external_id() -> String { "000000000000".to_string() }
fn default_database() -> String { "engagement".to_string() }
fn default_query_string() -> String {
    "SELECT user_id FROM endpoint_activity WHERE last_active < date_add('day', -30, now())"
        .to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            query_polls_until_complete: default_query_polls(),
            import_polls_until_complete: default_import_polls(),
            external_id: default_external_id(),
            database: default_database(),
            query_string: default_query_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("REENGAGE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_location_from_bucket() {
        let mut workflow = WorkflowConfig::default();
        workflow.export_bucket = "exports".to_string();
        assert_eq!(workflow.output_location(), "s3://exports/");

        workflow.export_bucket = "exports/".to_string();
        assert_eq!(workflow.output_location(), "s3://exports/");
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut workflow = WorkflowConfig::default();
        assert!(workflow.validate().is_ok());

        workflow.application_id = "  ".to_string();
        let err = workflow.validate().unwrap_err();
        assert!(err.to_string().contains("application_id"));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.workflow.wait_time_secs, 1);
        assert_eq!(config.workflow.ambiguity_policy, AmbiguityPolicy::FirstMatch);
        assert_eq!(config.api.http_port, 8080);
    }
}
