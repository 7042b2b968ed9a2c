use async_trait::async_trait;
use sift_audit::{AuditContext, AuditLogger};
use sift_core::{CompiledQuery, NormalizedPlan};
use sift_policy::ValidationError;

/// Where the orchestrator reports each stage of a request.
///
/// Recording never fails the request: implementations swallow (and log)
/// their own errors.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn plan_validated(&self, ctx: &AuditContext, plan: &NormalizedPlan);

    async fn plan_rejected(&self, ctx: &AuditContext, entity: &str, error: &ValidationError);

    async fn query_compiled(&self, ctx: &AuditContext, plan: &NormalizedPlan, query: &CompiledQuery);

    async fn query_executed(
        &self,
        ctx: &AuditContext,
        entity: &str,
        sql: &str,
        row_count: u64,
        duration_ms: u64,
    );

    async fn query_failed(&self, ctx: &AuditContext, entity: &str, sql: Option<&str>, error: &str);
}

#[async_trait]
impl AuditSink for AuditLogger {
    async fn plan_validated(&self, ctx: &AuditContext, plan: &NormalizedPlan) {
        if let Err(e) = self.log_plan_validated(ctx, plan).await {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }

    async fn plan_rejected(&self, ctx: &AuditContext, entity: &str, error: &ValidationError) {
        let kind = error_kind_name(error);
        if let Err(e) = self
            .log_plan_rejected(ctx, entity, &kind, &error.message)
            .await
        {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }

    async fn query_compiled(&self, ctx: &AuditContext, plan: &NormalizedPlan, query: &CompiledQuery) {
        if let Err(e) = self.log_query_compiled(ctx, plan, query).await {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }

    async fn query_executed(
        &self,
        ctx: &AuditContext,
        entity: &str,
        sql: &str,
        row_count: u64,
        duration_ms: u64,
    ) {
        if let Err(e) = self
            .log_query_executed(ctx, entity, sql, row_count, duration_ms)
            .await
        {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }

    async fn query_failed(&self, ctx: &AuditContext, entity: &str, sql: Option<&str>, error: &str) {
        if let Err(e) = self.log_query_failed(ctx, entity, sql, error).await {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }
}

/// snake_case kind name, e.g. `ambiguous_column`.
fn error_kind_name(error: &ValidationError) -> String {
    serde_json::to_value(error.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", error.kind))
}
