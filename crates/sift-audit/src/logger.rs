//! Audit logger implementation.
//!
//! Provides the main `AuditLogger` type with helper methods for each stage a
//! Plan passes through.

use sift_core::{AuditConfig, CompiledQuery, NormalizedPlan};
use std::sync::Arc;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventBuilder, AuditEventType};
use crate::storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};

/// Request-scoped fields stamped onto every event of one question.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub user_id: Option<String>,
    pub question_hash: Option<String>,
    pub correlation_id: Option<String>,
}

impl AuditContext {
    fn apply(&self, mut builder: AuditEventBuilder) -> AuditEventBuilder {
        if let Some(ref user) = self.user_id {
            builder = builder.user_id(user);
        }
        if let Some(ref hash) = self.question_hash {
            builder = builder.question_hash(hash);
        }
        if let Some(ref id) = self.correlation_id {
            builder = builder.correlation_id(id);
        }
        builder
    }
}

/// The main audit logger.
pub struct AuditLogger {
    config: AuditConfig,
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let storage: Arc<dyn AuditStorage> = match (config.enabled, &config.directory) {
            (false, _) => Arc::new(NullStorage::new()),
            (true, Some(dir)) if config.stdout => Arc::new(DualStorage::new(dir)?),
            (true, Some(dir)) => Arc::new(FileStorage::new(dir)?),
            (true, None) if config.stdout => Arc::new(ConsoleStorage::new()),
            (true, None) => Arc::new(NullStorage::new()),
        };

        Ok(Self { config, storage })
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(config: AuditConfig, storage: Arc<dyn AuditStorage>) -> Self {
        Self { config, storage }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self {
            config: AuditConfig {
                enabled: false,
                ..Default::default()
            },
            storage: Arc::new(NullStorage::new()),
        }
    }

    /// Create a console-only logger (useful for development).
    pub fn console_only() -> Self {
        Self {
            config: AuditConfig {
                enabled: true,
                stdout: true,
                ..Default::default()
            },
            storage: Arc::new(ConsoleStorage::new()),
        }
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.config.enabled {
            return Ok(());
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            entity = event.entity.as_deref().unwrap_or("-"),
            "Audit event"
        );

        self.storage.store(event).await
    }

    /// Log a plan that passed validation.
    pub async fn log_plan_validated(
        &self,
        ctx: &AuditContext,
        plan: &NormalizedPlan,
    ) -> Result<(), AuditError> {
        let event = ctx
            .apply(AuditEvent::builder(AuditEventType::PlanValidated))
            .entity(&plan.base)
            .tables(plan.entities().into_iter().map(str::to_string).collect())
            .contains_sensitive(plan.contains_sensitive)
            .build();

        self.log(event).await
    }

    /// Log a plan rejected by validation.
    pub async fn log_plan_rejected(
        &self,
        ctx: &AuditContext,
        entity: &str,
        error_kind: &str,
        message: &str,
    ) -> Result<(), AuditError> {
        let event = ctx
            .apply(AuditEvent::builder(AuditEventType::PlanRejected))
            .entity(entity)
            .error_kind(error_kind)
            .error(message)
            .build();

        self.log(event).await
    }

    /// Log the SQL compiled for a plan. Parameter values are only recorded
    /// when `log_params` is enabled.
    pub async fn log_query_compiled(
        &self,
        ctx: &AuditContext,
        plan: &NormalizedPlan,
        query: &CompiledQuery,
    ) -> Result<(), AuditError> {
        let mut builder = ctx
            .apply(AuditEvent::builder(AuditEventType::QueryCompiled))
            .entity(&plan.base)
            .sql(&query.sql)
            .contains_sensitive(plan.contains_sensitive);

        if self.config.log_params {
            builder = builder.params(serde_json::to_value(&query.params)?);
        }

        self.log(builder.build()).await
    }

    /// Log a query execution event.
    pub async fn log_query_executed(
        &self,
        ctx: &AuditContext,
        entity: &str,
        sql: &str,
        row_count: u64,
        duration_ms: u64,
    ) -> Result<(), AuditError> {
        let event = ctx
            .apply(AuditEvent::builder(AuditEventType::QueryExecuted))
            .entity(entity)
            .sql(sql)
            .row_count(row_count)
            .duration_ms(duration_ms)
            .build();

        self.log(event).await
    }

    /// Log a compilation or execution failure.
    pub async fn log_query_failed(
        &self,
        ctx: &AuditContext,
        entity: &str,
        sql: Option<&str>,
        error: &str,
    ) -> Result<(), AuditError> {
        let mut builder = ctx
            .apply(AuditEvent::builder(AuditEventType::QueryFailed))
            .entity(entity)
            .error(error);

        if let Some(sql) = sql {
            builder = builder.sql(sql);
        }

        self.log(builder.build()).await
    }

    /// Query audit events with filters.
    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.storage.query(filter).await
    }

    /// Get an audit event by ID.
    pub async fn get(&self, event_id: uuid::Uuid) -> Result<Option<AuditEvent>, AuditError> {
        self.storage.get(event_id).await
    }

    /// Get recent events for a user.
    pub async fn recent_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(AuditFilter {
            user_id: Some(user_id.to_string()),
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }
}

/// Filter for querying audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Filter by user ID.
    pub user_id: Option<String>,
    /// Filter by base entity.
    pub entity: Option<String>,
    /// Filter by event type.
    pub event_type: Option<AuditEventType>,
    /// Filter by correlation ID.
    pub correlation_id: Option<String>,
    /// Only events that touched sensitive columns.
    pub sensitive_only: bool,
    /// Filter by start time.
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Filter by end time.
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl AuditFilter {
    /// Whether `event` passes every set criterion. Ignores limit and offset.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref user) = self.user_id {
            if event.user_id.as_ref() != Some(user) {
                return false;
            }
        }
        if let Some(ref entity) = self.entity {
            if event.entity.as_ref() != Some(entity) {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        if let Some(ref id) = self.correlation_id {
            if event.correlation_id.as_ref() != Some(id) {
                return false;
            }
        }
        if self.sensitive_only && event.contains_sensitive != Some(true) {
            return false;
        }
        if let Some(start) = self.start_time {
            if event.occurred_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.occurred_at > end {
                return false;
            }
        }
        true
    }
}
