//! Result redaction.
//!
//! Fields are matched by the trailing component of their output name, so
//! `email`, `customers.email` and `"customers"."email"` are all masked.

use sift_core::{NormalizedPlan, SchemaRegistry};
use std::collections::BTreeSet;

use crate::executor::Row;

pub const REDACTION_MARKER: &str = "[redacted]";

#[derive(Debug, Clone)]
pub struct Redactor {
    sensitive: BTreeSet<String>,
    marker: serde_json::Value,
}

impl Redactor {
    /// Masks every column any entity declares sensitive.
    pub fn new(registry: &SchemaRegistry) -> Self {
        Self {
            sensitive: registry
                .all_sensitive_columns()
                .into_iter()
                .map(str::to_ascii_lowercase)
                .collect(),
            marker: serde_json::Value::String(REDACTION_MARKER.to_string()),
        }
    }

    /// Also masks aggregation outputs that pass sensitive values through
    /// (`MIN(customers.dob) AS oldest`).
    pub fn for_plan(registry: &SchemaRegistry, plan: &NormalizedPlan) -> Self {
        let mut redactor = Self::new(registry);
        redactor.sensitive.extend(
            plan.sensitive_outputs
                .iter()
                .map(|name| name.to_ascii_lowercase()),
        );
        redactor
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = serde_json::Value::String(marker.into());
        self
    }

    pub fn is_sensitive_field(&self, name: &str) -> bool {
        let base = name.rsplit('.').next().unwrap_or(name).trim_matches('"');
        self.sensitive.contains(&base.to_ascii_lowercase())
    }

    /// Replace sensitive values in place. Field order and count never change.
    pub fn redact_row(&self, mut row: Row) -> Row {
        for (name, value) in row.iter_mut() {
            if self.is_sensitive_field(name) {
                *value = self.marker.clone();
            }
        }
        row
    }

    pub fn redact_rows(&self, rows: Vec<Row>, allow_sensitive: bool) -> Vec<Row> {
        if allow_sensitive {
            return rows;
        }
        rows.into_iter().map(|row| self.redact_row(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().unwrap()
    }

    #[test]
    fn masks_sensitive_fields_by_base_name() {
        let redactor = Redactor::new(&registry());
        let rows = vec![row(json!({
            "customer_id": 7,
            "customers.email": "ana@example.com",
            "phone": "+40 700 000 000",
            "city": "Cluj-Napoca",
        }))];

        let out = redactor.redact_rows(rows, false);
        assert_eq!(
            serde_json::Value::Object(out[0].clone()),
            json!({
                "customer_id": 7,
                "customers.email": "[redacted]",
                "phone": "[redacted]",
                "city": "Cluj-Napoca",
            })
        );
    }

    #[test]
    fn preserves_field_order() {
        let redactor = Redactor::new(&registry());
        let out = redactor.redact_row(row(json!({"z": 1, "dob": "1990-01-01", "a": 2})));
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "dob", "a"]);
    }

    #[test]
    fn allow_sensitive_passes_rows_through() {
        let redactor = Redactor::new(&registry());
        let rows = vec![row(json!({"email": "ana@example.com"}))];
        let out = redactor.redact_rows(rows.clone(), true);
        assert_eq!(out, rows);
    }

    #[test]
    fn null_values_are_masked_too() {
        let redactor = Redactor::new(&registry()).with_marker("***");
        let out = redactor.redact_row(row(json!({"email": null})));
        assert_eq!(out["email"], json!("***"));
    }

    #[test]
    fn quoted_and_mixed_case_names() {
        let redactor = Redactor::new(&registry());
        assert!(redactor.is_sensitive_field("\"customers\".\"email\""));
        assert!(redactor.is_sensitive_field("DOB"));
        assert!(!redactor.is_sensitive_field("email_domain"));
        assert!(!redactor.is_sensitive_field("customers.city"));
    }

    #[test]
    fn plan_sensitive_outputs_are_masked() {
        let registry = registry();
        let plan = NormalizedPlan {
            base: "customers".into(),
            select: vec![],
            filters: vec![],
            joins: vec![],
            group_by: vec![],
            aggregations: vec![],
            order_by: vec![],
            limit: 50,
            contains_sensitive: true,
            sensitive_outputs: vec!["oldest".into()],
        };
        let redactor = Redactor::for_plan(&registry, &plan);
        let out = redactor.redact_row(row(json!({"oldest": "1950-02-03", "n": 4})));
        assert_eq!(out["oldest"], json!("[redacted]"));
        assert_eq!(out["n"], json!(4));
        assert!(!Redactor::new(&registry).is_sensitive_field("oldest"));
    }
}
