//! References returned alongside every answer.

use serde::{Deserialize, Serialize};
use sift_core::{CompiledQuery, NormalizedPlan, SchemaRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationType {
    SqlTemplate,
    Doc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub citation_type: CitationType,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// The compiled SQL with its bound parameters verbatim, then a pointer to the
/// definitions of the entities the query read.
pub fn make_citations(
    compiled: &CompiledQuery,
    plan: &NormalizedPlan,
    registry: &SchemaRegistry,
) -> Vec<Citation> {
    let params = serde_json::to_value(&compiled.params).unwrap_or(serde_json::Value::Null);

    let tables: Vec<String> = plan
        .entities()
        .into_iter()
        .map(|name| match registry.entity(name) {
            Some(e) => format!("{}.{}", e.schema, e.name),
            None => name.to_string(),
        })
        .collect();

    vec![
        Citation {
            id: "sql-compiled".to_string(),
            title: "Compiled SQL".to_string(),
            citation_type: CitationType::SqlTemplate,
            detail: compiled.sql.clone(),
            params: Some(params),
        },
        Citation {
            id: "metrics-def".to_string(),
            title: "Metric & Table Definitions".to_string(),
            citation_type: CitationType::Doc,
            detail: format!(
                "Schema registry v{} ({}). See metrics.md for definitions of these tables and common metrics.",
                registry.version(),
                tables.join(", ")
            ),
            params: None,
        },
    ]
}
