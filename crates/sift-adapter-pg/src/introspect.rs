//! Registry drift detection.
//!
//! Compares the schema registry against the live catalog so a renamed or
//! retyped column is caught at startup rather than as a failed query.
//! Uses `pg_catalog` because materialized views are missing from
//! `information_schema`.

use serde::Serialize;
use sift_core::{ColumnType, SchemaRegistry};
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryDrift {
    MissingRelation {
        entity: String,
        relation: String,
    },
    MissingColumn {
        entity: String,
        column: String,
    },
    TypeMismatch {
        entity: String,
        column: String,
        declared: String,
        actual: String,
    },
}

impl std::fmt::Display for RegistryDrift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRelation { entity, relation } => {
                write!(f, "entity '{}': relation {} does not exist", entity, relation)
            }
            Self::MissingColumn { entity, column } => {
                write!(f, "entity '{}': column '{}' does not exist", entity, column)
            }
            Self::TypeMismatch {
                entity,
                column,
                declared,
                actual,
            } => write!(
                f,
                "entity '{}': column '{}' is declared {} but is {}",
                entity, column, declared, actual
            ),
        }
    }
}

/// Every difference between the registry and the database. Empty when they agree.
pub async fn check_registry(
    pool: &PgPool,
    registry: &SchemaRegistry,
) -> anyhow::Result<Vec<RegistryDrift>> {
    let mut drift = Vec::new();

    for entity in registry.entities() {
        let rows = sqlx::query(
            r#"
            select a.attname as column_name,
                   format_type(a.atttypid, a.atttypmod) as data_type
            from pg_attribute a
            join pg_class c on c.oid = a.attrelid
            join pg_namespace n on n.oid = c.relnamespace
            where n.nspname = $1
              and c.relname = $2
              and a.attnum > 0
              and not a.attisdropped
            order by a.attnum
            "#,
        )
        .bind(&entity.schema)
        .bind(&entity.name)
        .fetch_all(pool)
        .await?;

        let actual: BTreeMap<String, String> = rows
            .into_iter()
            .map(|r| (r.get("column_name"), r.get("data_type")))
            .collect();

        drift.extend(compare_entity(
            &entity.name,
            &entity.schema,
            entity.columns.iter().map(|c| (c.name.as_str(), c.column_type)),
            &actual,
        ));
    }

    if drift.is_empty() {
        tracing::info!(entities = registry.entities().len(), "Registry matches database");
    } else {
        tracing::warn!(differences = drift.len(), "Registry drift detected");
    }

    Ok(drift)
}

fn compare_entity<'a>(
    entity: &str,
    schema: &str,
    declared: impl Iterator<Item = (&'a str, ColumnType)>,
    actual: &BTreeMap<String, String>,
) -> Vec<RegistryDrift> {
    if actual.is_empty() {
        return vec![RegistryDrift::MissingRelation {
            entity: entity.to_string(),
            relation: format!("{}.{}", schema, entity),
        }];
    }

    let mut out = Vec::new();
    for (column, column_type) in declared {
        match actual.get(column) {
            None => out.push(RegistryDrift::MissingColumn {
                entity: entity.to_string(),
                column: column.to_string(),
            }),
            Some(pg_type) if !type_matches(column_type, pg_type) => {
                out.push(RegistryDrift::TypeMismatch {
                    entity: entity.to_string(),
                    column: column.to_string(),
                    declared: format!("{:?}", column_type).to_lowercase(),
                    actual: pg_type.clone(),
                })
            }
            Some(_) => {}
        }
    }
    out
}

/// Whether a `format_type` name can hold values of the declared type.
fn type_matches(declared: ColumnType, pg_type: &str) -> bool {
    let base = pg_type.split('(').next().unwrap_or(pg_type).trim();
    match declared {
        ColumnType::Text => matches!(
            base,
            "text" | "character varying" | "character" | "uuid" | "citext" | "name"
        ),
        ColumnType::Integer => matches!(base, "integer" | "bigint" | "smallint"),
        ColumnType::Numeric => matches!(
            base,
            "numeric" | "real" | "double precision" | "integer" | "bigint" | "smallint"
        ),
        ColumnType::Date => base == "date",
        ColumnType::Timestamp => base.starts_with("timestamp"),
        ColumnType::Boolean => base == "boolean",
    }
}
