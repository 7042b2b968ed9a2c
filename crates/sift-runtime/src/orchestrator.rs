use crate::audit::AuditSink;
use crate::citations::{Citation, make_citations};
use crate::error::RuntimeError;
use crate::executor::{QueryExecutor, Row};
use crate::redactor::Redactor;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sift_audit::AuditContext;
use sift_compiler::QueryCompiler;
use sift_core::{CompiledQuery, NormalizedPlan, RawPlan, SchemaRegistry};
use sift_policy::PlanValidator;
use std::sync::Arc;
use std::time::Instant;

/// Per-request caller options.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Return sensitive column values instead of the redaction marker.
    pub allow_sensitive: bool,
    pub user_id: Option<String>,
    /// Natural-language question the Plan was derived from. Only its hash is
    /// ever logged or returned.
    pub question: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerMeta {
    pub request_id: String,
    pub compiled_sql: String,
    pub contains_sensitive: bool,
    /// Whether sensitive values were masked in `rows`.
    pub redacted: bool,
    pub exec_latency_ms: u64,
    pub total_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub rows: Vec<Row>,
    pub count: usize,
    pub citations: Vec<Citation>,
    pub meta: AnswerMeta,
}

pub struct Orchestrator<E: QueryExecutor, S: AuditSink> {
    registry: Arc<SchemaRegistry>,
    executor: E,
    audit: S,
}

impl<E: QueryExecutor, S: AuditSink> Orchestrator<E, S> {
    pub fn new(registry: Arc<SchemaRegistry>, executor: E, audit: S) -> Self {
        Self {
            registry,
            executor,
            audit,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate and compile without executing or auditing.
    pub fn prepare(&self, raw: &RawPlan) -> Result<(NormalizedPlan, CompiledQuery), RuntimeError> {
        let plan = PlanValidator::new(&self.registry).validate(raw)?;
        let compiled = QueryCompiler::new(&self.registry).compile(&plan)?;
        Ok((plan, compiled))
    }

    /// Validate, compile, execute, redact and cite a raw Plan.
    pub async fn answer(&self, raw: &RawPlan, opts: &AskOptions) -> Result<Answer, RuntimeError> {
        let started = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let ctx = AuditContext {
            user_id: opts.user_id.clone(),
            question_hash: opts.question.as_deref().map(question_hash),
            correlation_id: Some(request_id.clone()),
        };

        let plan = match PlanValidator::new(&self.registry).validate(raw) {
            Ok(plan) => plan,
            Err(e) => {
                self.audit.plan_rejected(&ctx, &raw.view, &e).await;
                return Err(e.into());
            }
        };
        self.audit.plan_validated(&ctx, &plan).await;

        let compiled = match QueryCompiler::new(&self.registry).compile(&plan) {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::error!(error = %e, entity = %plan.base, "Validated plan failed to compile");
                self.audit
                    .query_failed(&ctx, &plan.base, None, &e.to_string())
                    .await;
                return Err(e.into());
            }
        };
        self.audit.query_compiled(&ctx, &plan, &compiled).await;

        let exec_started = Instant::now();
        let rows = match self.executor.execute(&compiled).await {
            Ok(rows) => rows,
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::warn!(error = %message, entity = %plan.base, "Query execution failed");
                self.audit
                    .query_failed(&ctx, &plan.base, Some(&compiled.sql), &message)
                    .await;
                return Err(RuntimeError::Execution(e));
            }
        };
        let exec_latency_ms = elapsed_ms(exec_started);
        self.audit
            .query_executed(
                &ctx,
                &plan.base,
                &compiled.sql,
                rows.len() as u64,
                exec_latency_ms,
            )
            .await;

        let rows = Redactor::for_plan(&self.registry, &plan).redact_rows(rows, opts.allow_sensitive);
        let citations = make_citations(&compiled, &plan, &self.registry);
        let total_latency_ms = elapsed_ms(started);

        tracing::info!(
            request_id = %request_id,
            user_id = ctx.user_id.as_deref().unwrap_or("-"),
            question_hash = ctx.question_hash.as_deref().unwrap_or("-"),
            entity = %plan.base,
            rows = rows.len(),
            contains_sensitive = plan.contains_sensitive,
            exec_latency_ms,
            total_latency_ms,
            "Answered plan"
        );

        Ok(Answer {
            count: rows.len(),
            rows,
            citations,
            meta: AnswerMeta {
                request_id,
                compiled_sql: compiled.sql,
                contains_sensitive: plan.contains_sensitive,
                redacted: !opts.allow_sensitive,
                exec_latency_ms,
                total_latency_ms,
                question_hash: ctx.question_hash,
                user_id: ctx.user_id,
            },
        })
    }
}

/// First 16 hex characters of the question's SHA-256.
pub fn question_hash(question: &str) -> String {
    let digest = Sha256::digest(question.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_hash_is_truncated_sha256() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(question_hash("abc"), "ba7816bf8f01cfea");
        assert_eq!(question_hash("How many open claims?").len(), 16);
    }
}
