//! Postgres execution for compiled Sift queries.
//!
//! Named placeholders are rewritten to `$n`, every value is bound through
//! [`PgArguments`], and each query runs in its own read-only transaction with
//! a local statement timeout. Rows come back as JSON objects via `to_jsonb`.

use async_trait::async_trait;
use sift_compiler::ToPositional;
use sift_core::config::ConnectionPoolConfig;
use sift_core::{BoundValue, CompiledQuery, ScalarValue};
use sift_runtime::{QueryExecutor, Row};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{Arguments, Row as _};
use std::time::Duration;

pub mod introspect;

pub use introspect::{RegistryDrift, check_registry};

fn args_add<T>(args: &mut PgArguments, v: T) -> anyhow::Result<()>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    args.add(v).map_err(|e| anyhow::anyhow!(e))
}

pub struct PostgresExecutor {
    pool: sqlx::PgPool,
    statement_timeout_ms: u64,
}

impl PostgresExecutor {
    pub async fn connect(database_url: &str, options: &ConnectionPoolConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(options.min_connections)
            .max_connections(options.max_connections)
            .acquire_timeout(Duration::from_secs(options.acquire_timeout_seconds))
            .connect(database_url)
            .await?;
        tracing::info!(
            max_connections = options.max_connections,
            "Connected to Postgres"
        );
        Ok(Self {
            pool,
            statement_timeout_ms: options.statement_timeout_ms,
        })
    }

    pub fn from_pool(pool: sqlx::PgPool, statement_timeout_ms: u64) -> Self {
        Self {
            pool,
            statement_timeout_ms,
        }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute(&self, query: &CompiledQuery) -> anyhow::Result<Vec<Row>> {
        let positional = query.to_positional()?;
        let sql = wrap_as_json(&positional.sql);

        let mut args = PgArguments::default();
        for value in &positional.params {
            bind_value(&mut args, value)?;
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        if self.statement_timeout_ms > 0 {
            sqlx::query(&format!(
                "SET LOCAL statement_timeout = {}",
                self.statement_timeout_ms
            ))
            .execute(&mut *tx)
            .await?;
        }

        tracing::debug!(sql = %positional.sql, params = positional.params.len(), "Executing query");
        let records = sqlx::query_with(&sql, args).fetch_all(&mut *tx).await?;
        tx.commit().await?;

        records
            .into_iter()
            .map(|r| {
                let value: serde_json::Value = r.try_get("row")?;
                match value {
                    serde_json::Value::Object(map) => Ok(map),
                    other => Err(anyhow::anyhow!("Expected a JSON object row, got {}", other)),
                }
            })
            .collect()
    }
}

/// Wrap a SELECT so each row comes back as one JSON object in column order.
fn wrap_as_json(sql: &str) -> String {
    format!("SELECT to_jsonb(t) AS row FROM ({}) AS t", sql)
}

fn bind_value(args: &mut PgArguments, value: &BoundValue) -> anyhow::Result<()> {
    match value {
        BoundValue::Scalar(v) => bind_scalar(args, v),
        BoundValue::List(items) => bind_list(args, items),
    }
}

fn bind_scalar(args: &mut PgArguments, value: &ScalarValue) -> anyhow::Result<()> {
    match value {
        ScalarValue::Boolean(b) => args_add(args, *b),
        ScalarValue::Integer(i) => args_add(args, *i),
        ScalarValue::Float(f) => args_add(args, *f),
        // Dates and timestamps bind as text; the compiled SQL casts them.
        ScalarValue::Text(s) => args_add(args, s.clone()),
    }
}

/// Postgres arrays are homogeneous, so a list binds as the narrowest
/// element type that holds every item.
fn bind_list(args: &mut PgArguments, items: &[ScalarValue]) -> anyhow::Result<()> {
    match ListKind::of(items)? {
        ListKind::Text => args_add(
            args,
            items
                .iter()
                .filter_map(|v| v.as_text().map(str::to_string))
                .collect::<Vec<String>>(),
        ),
        ListKind::Integer => args_add(
            args,
            items
                .iter()
                .filter_map(|v| match v {
                    ScalarValue::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<i64>>(),
        ),
        ListKind::Float => args_add(
            args,
            items
                .iter()
                .filter_map(|v| match v {
                    ScalarValue::Integer(i) => Some(*i as f64),
                    ScalarValue::Float(f) => Some(*f),
                    _ => None,
                })
                .collect::<Vec<f64>>(),
        ),
        ListKind::Boolean => args_add(
            args,
            items
                .iter()
                .filter_map(|v| match v {
                    ScalarValue::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<bool>>(),
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Text,
    Integer,
    Float,
    Boolean,
}

impl ListKind {
    fn of(items: &[ScalarValue]) -> anyhow::Result<Self> {
        let all = |pred: fn(&ScalarValue) -> bool| items.iter().all(pred);

        if all(|v| matches!(v, ScalarValue::Text(_))) {
            Ok(Self::Text)
        } else if all(|v| matches!(v, ScalarValue::Integer(_))) {
            Ok(Self::Integer)
        } else if all(|v| matches!(v, ScalarValue::Integer(_) | ScalarValue::Float(_))) {
            Ok(Self::Float)
        } else if all(|v| matches!(v, ScalarValue::Boolean(_))) {
            Ok(Self::Boolean)
        } else {
            Err(anyhow::anyhow!(
                "List mixes value types and cannot be bound as a Postgres array"
            ))
        }
    }
}
