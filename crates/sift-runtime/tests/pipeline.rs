//! Orchestrator against an in-memory executor.

use async_trait::async_trait;
use serde_json::json;
use sift_audit::{AuditEventType, AuditFilter, AuditLogger};
use sift_core::{AuditConfig, CompiledQuery, RawPlan, SchemaRegistry};
use sift_runtime::{AskOptions, Orchestrator, QueryExecutor, Row, RuntimeError, question_hash};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeExecutor {
    rows: Vec<Row>,
    fail: bool,
    seen: Mutex<Vec<CompiledQuery>>,
}

impl FakeExecutor {
    fn returning(rows: Vec<serde_json::Value>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|v| v.as_object().cloned().unwrap())
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(&self, query: &CompiledQuery) -> anyhow::Result<Vec<Row>> {
        self.seen.lock().unwrap().push(query.clone());
        if self.fail {
            anyhow::bail!("connection reset");
        }
        Ok(self.rows.clone())
    }
}

fn plan(value: serde_json::Value) -> RawPlan {
    serde_json::from_value(value).unwrap()
}

fn file_audit(dir: &std::path::Path) -> AuditLogger {
    AuditLogger::new(AuditConfig {
        enabled: true,
        stdout: false,
        directory: Some(dir.to_path_buf()),
        log_params: false,
    })
    .unwrap()
}

fn registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::builtin().unwrap())
}

#[tokio::test]
async fn answers_with_redacted_rows_and_citations() {
    let executor = FakeExecutor::returning(vec![
        json!({"full_name": "Ana Pop", "email": "ana@example.com", "city": "Cluj-Napoca"}),
        json!({"full_name": "Ion Rus", "email": "ion@example.com", "city": "Cluj-Napoca"}),
    ]);
    let orchestrator = Orchestrator::new(registry(), executor, AuditLogger::disabled());

    let raw = plan(json!({
        "view": "customers",
        "select": ["full_name", "email", "city"],
        "filters": [{"col": "city", "op": "ILIKE", "val": "Cluj%"}],
        "limit": 10
    }));
    let opts = AskOptions {
        user_id: Some("analyst-7".into()),
        question: Some("Who are our Cluj customers?".into()),
        ..Default::default()
    };

    let answer = orchestrator.answer(&raw, &opts).await.unwrap();

    assert_eq!(answer.count, 2);
    assert!(answer.rows.iter().all(|r| r["email"] == json!("[redacted]")));
    assert_eq!(answer.rows[0]["full_name"], json!("Ana Pop"));
    assert!(answer.meta.contains_sensitive);
    assert!(answer.meta.redacted);
    assert_eq!(
        answer.meta.question_hash.as_deref(),
        Some(question_hash("Who are our Cluj customers?").as_str())
    );
    assert_eq!(answer.meta.user_id.as_deref(), Some("analyst-7"));
    assert!(answer.meta.compiled_sql.ends_with("LIMIT 10"));

    let ids: Vec<&str> = answer.citations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["sql-compiled", "metrics-def"]);
    assert_eq!(answer.citations[0].detail, answer.meta.compiled_sql);

    // The question text never leaves the process.
    let serialized = serde_json::to_string(&answer).unwrap();
    assert!(!serialized.contains("Who are our Cluj customers?"));
}

#[tokio::test]
async fn allow_sensitive_returns_raw_values() {
    let executor = FakeExecutor::returning(vec![json!({"email": "ana@example.com"})]);
    let orchestrator = Orchestrator::new(registry(), executor, AuditLogger::disabled());

    let raw = plan(json!({"view": "customers", "select": ["email"]}));
    let opts = AskOptions {
        allow_sensitive: true,
        ..Default::default()
    };

    let answer = orchestrator.answer(&raw, &opts).await.unwrap();
    assert_eq!(answer.rows[0]["email"], json!("ana@example.com"));
    assert!(!answer.meta.redacted);
}

#[tokio::test]
async fn rejected_plan_is_audited_and_never_executed() {
    let dir = tempfile::tempdir().unwrap();
    let executor = FakeExecutor::default();
    let orchestrator = Orchestrator::new(registry(), executor, file_audit(dir.path()));

    let raw = plan(json!({
        "view": "claims",
        "select": ["status"],
        "joins": ["claims->policies"]
    }));

    let err = orchestrator
        .answer(&raw, &AskOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_user_error());
    match err {
        RuntimeError::Validation(e) => assert_eq!(e.reference.as_deref(), Some("status")),
        other => panic!("unexpected error: {other}"),
    }

    let audit = file_audit(dir.path());
    let events = audit.query(AuditFilter::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, AuditEventType::PlanRejected);
    assert_eq!(events[0].error_kind.as_deref(), Some("ambiguous_column"));
    assert_eq!(events[0].entity.as_deref(), Some("claims"));
}

#[tokio::test]
async fn successful_request_leaves_three_correlated_events() {
    let dir = tempfile::tempdir().unwrap();
    let executor = FakeExecutor::returning(vec![json!({"status": "open", "n": 12})]);
    let orchestrator = Orchestrator::new(registry(), executor, file_audit(dir.path()));

    let raw = plan(json!({
        "view": "claims",
        "select": ["claims.status", "count(*) as n"],
        "group_by": ["claims.status"]
    }));
    let answer = orchestrator
        .answer(&raw, &AskOptions::default())
        .await
        .unwrap();

    let audit = file_audit(dir.path());
    let events = audit
        .query(AuditFilter {
            correlation_id: Some(answer.meta.request_id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    let kinds: Vec<AuditEventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            AuditEventType::PlanValidated,
            AuditEventType::QueryCompiled,
            AuditEventType::QueryExecuted,
        ]
    );
    assert_eq!(events[2].row_count, Some(1));
    assert!(events.iter().all(|e| e.params.is_none()));
}

#[tokio::test]
async fn execution_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let executor = FakeExecutor {
        fail: true,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(registry(), executor, file_audit(dir.path()));

    let raw = plan(json!({"view": "policies", "select": ["status"]}));
    let err = orchestrator
        .answer(&raw, &AskOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Execution(_)));
    assert!(!err.is_user_error());

    let events = file_audit(dir.path())
        .query(AuditFilter {
            event_type: Some(AuditEventType::QueryFailed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error.as_deref(), Some("connection reset"));
}

#[test]
fn prepare_compiles_without_executing() {
    let executor = FakeExecutor::default();
    let orchestrator = Orchestrator::new(registry(), executor, AuditLogger::disabled());

    let raw = plan(json!({"view": "policies", "select": ["gross_premium"], "limit": 0}));
    let (normalized, compiled) = orchestrator.prepare(&raw).unwrap();
    assert_eq!(normalized.limit, 50);
    assert!(!normalized.contains_sensitive);
    assert_eq!(
        compiled.sql,
        "SELECT policies.gross_premium FROM core.\"policies\" policies LIMIT 50"
    );
}
