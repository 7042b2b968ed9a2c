//! `sift run`: execute a Plan against the configured database.

use anyhow::Result;
use sift_audit::AuditLogger;
use sift_core::{SchemaRegistry, SiftConfig};
use sift_runtime::{AskOptions, Orchestrator, RuntimeError};
use std::path::Path;
use std::sync::Arc;

use crate::commands::plan::read_plan;

pub async fn run(
    config: &SiftConfig,
    registry: SchemaRegistry,
    file: &Path,
    opts: AskOptions,
) -> Result<()> {
    let raw = read_plan(file)?;

    let url = config.upstream.connection_string();
    let executor = sift_adapter_pg::PostgresExecutor::connect(&url, &config.upstream.pool).await?;
    let audit = AuditLogger::new(config.audit.clone())?;
    let orchestrator = Orchestrator::new(Arc::new(registry), executor, audit);

    match orchestrator.answer(&raw, &opts).await {
        Ok(answer) => {
            println!("{}", serde_json::to_string_pretty(&answer)?);
            Ok(())
        }
        Err(RuntimeError::Validation(e)) => {
            println!("{}", serde_json::to_string_pretty(&e)?);
            anyhow::bail!("Plan rejected: {}", e)
        }
        Err(e) => Err(e.into()),
    }
}
