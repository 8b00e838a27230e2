//! reengage — finds disengaged users, loads them into the re-engagement
//! segment and tags it for campaigns.
//!
//! `serve` exposes the workflow steps and the record conversion endpoint over
//! HTTP; `convert` runs one transformation batch from stdin to stdout.

use std::io::{Read, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use reengage_api::ApiServer;
use reengage_connectors::Sandbox;
use reengage_core::config::AppConfig;
use reengage_export::{RecordTransformer, TransformationRequest};
use reengage_workflow::{ReengagementWorkflow, WorkflowStore};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "reengage")]
#[command(about = "Re-engagement audience pipeline")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "REENGAGE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "REENGAGE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Target application id (overrides config)
    #[arg(long, env = "REENGAGE__WORKFLOW__APPLICATION_ID")]
    application_id: Option<String>,

    /// Named query selecting unengaged users (overrides config)
    #[arg(long, env = "REENGAGE__WORKFLOW__NAMED_QUERY_ID")]
    named_query_id: Option<String>,

    /// Export bucket receiving query results (overrides config)
    #[arg(long, env = "REENGAGE__WORKFLOW__EXPORT_BUCKET")]
    export_bucket: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the workflow and conversion endpoints (default)
    Serve,
    /// Convert a transformation batch read from stdin
    Convert,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reengage=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Convert => convert(&config),
    }
}

/// Environment configuration with CLI overrides applied. A malformed
/// `REENGAGE__*` variable is fatal rather than silently replaced by defaults.
fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config =
        AppConfig::load().context("failed to load configuration from REENGAGE__ environment")?;

    // Apply CLI overrides
    if let Some(node_id) = &cli.node_id {
        config.node_id = node_id.clone();
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(application_id) = &cli.application_id {
        config.workflow.application_id = application_id.clone();
    }
    if let Some(named_query_id) = &cli.named_query_id {
        config.workflow.named_query_id = named_query_id.clone();
    }
    if let Some(bucket) = &cli.export_bucket {
        config.workflow.export_bucket = bucket.clone();
    }
    Ok(config)
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    config.workflow.validate()?;

    info!(
        node_id = %config.node_id,
        application_id = %config.workflow.application_id,
        named_query_id = %config.workflow.named_query_id,
        output_location = %config.workflow.output_location(),
        http_port = config.api.http_port,
        "Configuration loaded"
    );

    let sandbox = Sandbox::from_config(&config);
    let workflow = Arc::new(ReengagementWorkflow::new(
        &config.workflow,
        sandbox.query_engine,
        sandbox.segment_service,
        Arc::new(WorkflowStore::new()),
    ));
    let transformer = Arc::new(RecordTransformer::new(config.export.max_batch_records));

    let api_server = ApiServer::new(config, workflow, transformer);

    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("reengage is ready to serve traffic");

    api_server.start_http().await?;

    Ok(())
}

fn convert(config: &AppConfig) -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let request: TransformationRequest = serde_json::from_str(&input)?;

    let transformer = RecordTransformer::new(config.export.max_batch_records);
    let response = transformer.convert(&request);
    info!(
        records = response.records.len(),
        failed = response.failed_count(),
        "batch converted"
    );

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_overrides_and_malformed_environment() {
        let cli = Cli::parse_from(["reengage", "--application-id", "app-9", "--http-port", "9000"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.workflow.application_id, "app-9");
        assert_eq!(config.api.http_port, 9000);

        std::env::set_var("REENGAGE__METRICS__PORT", "ninety");
        let result = load_config(&cli);
        std::env::remove_var("REENGAGE__METRICS__PORT");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("REENGAGE__"));
    }
}
