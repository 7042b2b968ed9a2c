//! Audit event types.
//!
//! One event per stage a Plan passes through: validated or rejected,
//! compiled, then executed or failed. Events carry the compiled SQL but never
//! the raw question text; questions are identified by a truncated hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // ===== Validation =====
    /// Plan passed validation.
    PlanValidated,
    /// Plan was rejected by validation.
    PlanRejected,

    // ===== Compilation / execution =====
    /// Normalized plan compiled to SQL.
    QueryCompiled,
    /// Query was executed successfully.
    QueryExecuted,
    /// Compilation or execution failed.
    QueryFailed,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlanValidated => write!(f, "PLAN_VALIDATED"),
            Self::PlanRejected => write!(f, "PLAN_REJECTED"),
            Self::QueryCompiled => write!(f, "QUERY_COMPILED"),
            Self::QueryExecuted => write!(f, "QUERY_EXECUTED"),
            Self::QueryFailed => write!(f, "QUERY_FAILED"),
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Event type.
    pub event_type: AuditEventType,

    /// Who asked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Base entity of the plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    /// Compiled SQL (named placeholders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,

    /// Bound parameter values. Only recorded when enabled in configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,

    /// Truncated SHA-256 of the natural-language question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_hash: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains_sensitive: Option<bool>,

    /// Entities read by the query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,

    /// Number of rows returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    /// Duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Error message (if event_type indicates failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Machine-readable failure kind, e.g. `ambiguous_column`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Correlation ID shared by all events of one request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            user_id: None,
            entity: None,
            sql: None,
            params: None,
            question_hash: None,
            contains_sensitive: None,
            tables: None,
            row_count: None,
            duration_ms: None,
            error: None,
            error_kind: None,
            correlation_id: None,
            meta: serde_json::Value::Null,
        }
    }

    pub fn builder(event_type: AuditEventType) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type)
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE [user=...] [entity=...] [sql="..."] ...`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
        );

        if let Some(ref user) = self.user_id {
            line.push_str(&format!(" user={}", user));
        }

        if let Some(ref entity) = self.entity {
            line.push_str(&format!(" entity={}", entity));
        }

        if let Some(ref sql) = self.sql {
            // Truncate long SQL for console output
            let sql_preview = if sql.chars().count() > 120 {
                format!("{}...", sql.chars().take(120).collect::<String>())
            } else {
                sql.clone()
            };
            line.push_str(&format!(" sql=\"{}\"", sql_preview.replace('\n', " ")));
        }

        if self.contains_sensitive == Some(true) {
            line.push_str(" sensitive=true");
        }

        if let Some(row_count) = self.row_count {
            line.push_str(&format!(" rows={}", row_count));
        }

        if let Some(duration) = self.duration_ms {
            line.push_str(&format!(" duration_ms={}", duration));
        }

        if let Some(ref kind) = self.error_kind {
            line.push_str(&format!(" kind={}", kind));
        }

        if let Some(ref error) = self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }

        line
    }
}

/// Builder for creating audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event: AuditEvent::new(event_type),
        }
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.event.user_id = Some(user_id.into());
        self
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.event.entity = Some(entity.into());
        self
    }

    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.event.sql = Some(sql.into());
        self
    }

    pub fn params(mut self, params: serde_json::Value) -> Self {
        self.event.params = Some(params);
        self
    }

    pub fn question_hash(mut self, hash: impl Into<String>) -> Self {
        self.event.question_hash = Some(hash.into());
        self
    }

    pub fn contains_sensitive(mut self, sensitive: bool) -> Self {
        self.event.contains_sensitive = Some(sensitive);
        self
    }

    pub fn tables(mut self, tables: Vec<String>) -> Self {
        self.event.tables = Some(tables);
        self
    }

    pub fn row_count(mut self, count: u64) -> Self {
        self.event.row_count = Some(count);
        self
    }

    pub fn duration_ms(mut self, duration: u64) -> Self {
        self.event.duration_ms = Some(duration);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    pub fn error_kind(mut self, kind: impl Into<String>) -> Self {
        self.event.error_kind = Some(kind.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.event.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.event.meta = meta;
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = AuditEvent::builder(AuditEventType::QueryExecuted)
            .user_id("analyst-7")
            .entity("policies")
            .sql("SELECT policies.status FROM core.\"policies\" policies LIMIT 50")
            .row_count(42)
            .duration_ms(15)
            .build();

        assert_eq!(event.event_type, AuditEventType::QueryExecuted);
        assert_eq!(event.user_id.as_deref(), Some("analyst-7"));
        assert_eq!(event.entity.as_deref(), Some("policies"));
        assert_eq!(event.row_count, Some(42));
    }

    #[test]
    fn test_to_log_line() {
        let event = AuditEvent::builder(AuditEventType::PlanRejected)
            .user_id("analyst-7")
            .entity("claims")
            .error_kind("ambiguous_column")
            .error("Ambiguous column \"status\"")
            .build();

        let line = event.to_log_line();
        assert!(line.contains("PLAN_REJECTED"));
        assert!(line.contains("user=analyst-7"));
        assert!(line.contains("entity=claims"));
        assert!(line.contains("kind=ambiguous_column"));
        assert!(line.contains("error=\"Ambiguous column 'status'\""));
        assert!(!line.contains("sql="));
    }

    #[test]
    fn test_long_sql_is_truncated_in_log_line() {
        let sql = format!("SELECT {} FROM core.\"claims\" claims", "claims.paid, ".repeat(40));
        let line = AuditEvent::builder(AuditEventType::QueryCompiled)
            .sql(sql)
            .build()
            .to_log_line();
        assert!(line.contains("...\""));
    }

    #[test]
    fn test_optional_fields_are_omitted_from_json() {
        let event = AuditEvent::new(AuditEventType::PlanValidated);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "plan_validated");
        assert!(json.get("sql").is_none());
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(format!("{}", AuditEventType::PlanValidated), "PLAN_VALIDATED");
        assert_eq!(format!("{}", AuditEventType::QueryFailed), "QUERY_FAILED");
    }
}
