//! Filter validation.
//!
//! Turns `{col, op, val}` into a typed [`Filter`]: the operator is parsed into
//! the closed [`Operator`] set, the value slot is shaped by the operator, and
//! each value is checked against the column's declared type.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::columns::ColumnResolver;
use crate::error::ValidationError;
use sift_core::{
    ColumnType, Filter, FilterValue, Operator, RawFilter, ScalarValue, SchemaRegistry, ValueShape,
};

/// Validates filters against the registry's operator set and column types.
pub struct FilterValidator<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> FilterValidator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn validate(
        &self,
        raw: &RawFilter,
        resolver: &ColumnResolver<'_>,
    ) -> Result<Filter, ValidationError> {
        let op = Operator::parse(&raw.op).ok_or_else(|| ValidationError::unknown_operator(&raw.op))?;
        if !self.registry.is_allowed_operator(op) {
            return Err(ValidationError::operator_not_allowed(op.as_sql()));
        }

        let column = resolver.qualify(&raw.col)?;
        let column_name = column.to_string();
        let column_type = self
            .registry
            .column_type(&column)
            .ok_or_else(|| ValidationError::unknown_column(&column_name))?;

        if op == Operator::ILike && column_type != ColumnType::Text {
            return Err(ValidationError::operator_not_applicable(
                op.as_sql(),
                &column_name,
                type_label(column_type),
            ));
        }

        let value = shape_value(&column_name, op, &raw.val)?;
        for v in value.values() {
            check_type(&column_name, column_type, v)?;
        }

        Ok(Filter { column, op, value })
    }
}

/// Build the value slot an operator demands.
fn shape_value(column: &str, op: Operator, raw: &Value) -> Result<FilterValue, ValidationError> {
    match op.shape() {
        ValueShape::Scalar => ScalarValue::from_json(raw)
            .map(FilterValue::Scalar)
            .ok_or_else(|| ValidationError::invalid_filter_value(column, op.as_sql(), "a single value")),
        ValueShape::Range => match raw {
            Value::Array(items) if items.len() == 2 => {
                let start = scalar_item(column, op, &items[0])?;
                let end = scalar_item(column, op, &items[1])?;
                Ok(FilterValue::Range(start, end))
            }
            _ => Err(ValidationError::invalid_filter_value(
                column,
                op.as_sql(),
                "[start, end]",
            )),
        },
        ValueShape::List => match raw {
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| scalar_item(column, op, item))
                .collect::<Result<Vec<_>, _>>()
                .map(FilterValue::List),
            _ => Err(ValidationError::invalid_filter_value(
                column,
                op.as_sql(),
                "a non-empty list",
            )),
        },
    }
}

fn scalar_item(column: &str, op: Operator, item: &Value) -> Result<ScalarValue, ValidationError> {
    ScalarValue::from_json(item).ok_or_else(|| {
        ValidationError::invalid_filter_value(column, op.as_sql(), "plain scalar elements")
    })
}

fn check_type(column: &str, column_type: ColumnType, value: &ScalarValue) -> Result<(), ValidationError> {
    let ok = match (column_type, value) {
        (ColumnType::Text, ScalarValue::Text(_)) => true,
        (ColumnType::Integer, ScalarValue::Integer(_)) => true,
        (ColumnType::Numeric, ScalarValue::Integer(_) | ScalarValue::Float(_)) => true,
        (ColumnType::Boolean, ScalarValue::Boolean(_)) => true,
        (ColumnType::Date, ScalarValue::Text(s)) => is_date(s),
        (ColumnType::Timestamp, ScalarValue::Text(s)) => is_timestamp(s),
        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(ValidationError::value_type_mismatch(
            column,
            expected_label(column_type),
            &format!("{} {}", value.type_name(), quoted(value)),
        ))
    }
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn is_timestamp(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || is_date(s)
}

fn quoted(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Text(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

fn type_label(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Text => "text",
        ColumnType::Integer => "integer",
        ColumnType::Numeric => "numeric",
        ColumnType::Date => "date",
        ColumnType::Timestamp => "timestamp",
        ColumnType::Boolean => "boolean",
    }
}

fn expected_label(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Text => "a string",
        ColumnType::Integer => "an integer",
        ColumnType::Numeric => "a number",
        ColumnType::Date => "a YYYY-MM-DD date string",
        ColumnType::Timestamp => "an RFC 3339 timestamp or date string",
        ColumnType::Boolean => "a boolean",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;
    use crate::joins::JoinScope;
    use serde_json::json;

    fn check(base: &str, joins: &[&str], filter: Value) -> Result<Filter, ValidationError> {
        let reg = SchemaRegistry::builtin().unwrap();
        let joins: Vec<String> = joins.iter().map(|s| s.to_string()).collect();
        let scope = JoinScope::resolve(&reg, base, &joins).unwrap();
        let resolver = ColumnResolver::new(&reg, &scope);
        let raw: RawFilter = serde_json::from_value(filter).unwrap();
        FilterValidator::new(&reg).validate(&raw, &resolver)
    }

    #[test]
    fn range_requires_exactly_two_values() {
        let ok = check(
            "claims",
            &[],
            json!({"col": "loss_date", "op": "BETWEEN", "val": ["2024-01-01", "2024-12-31"]}),
        )
        .unwrap();
        assert_eq!(ok.column.to_string(), "claims.loss_date");
        assert_eq!(
            ok.value,
            FilterValue::Range(
                ScalarValue::Text("2024-01-01".into()),
                ScalarValue::Text("2024-12-31".into())
            )
        );

        for val in [json!(["2024-01-01"]), json!(["a", "b", "c"]), json!("2024-01-01")] {
            let err = check(
                "claims",
                &[],
                json!({"col": "loss_date", "op": "between", "val": val}),
            )
            .unwrap_err();
            assert_eq!(err.kind, ValidationErrorKind::InvalidFilterValue);
        }
    }

    #[test]
    fn set_membership_requires_non_empty_list() {
        let ok = check(
            "policies",
            &[],
            json!({"col": "product_type", "op": "IN", "val": ["auto", "home"]}),
        )
        .unwrap();
        assert_eq!(ok.op, Operator::In);
        assert_eq!(ok.value.values().len(), 2);

        for val in [json!([]), json!("auto"), json!([["auto"]]), json!([null])] {
            let err = check(
                "policies",
                &[],
                json!({"col": "product_type", "op": "IN", "val": val}),
            )
            .unwrap_err();
            assert_eq!(err.kind, ValidationErrorKind::InvalidFilterValue);
        }
    }

    #[test]
    fn scalar_operators_reject_lists_and_null() {
        for val in [json!(["active"]), json!(null), json!({"$ne": 1})] {
            let err = check("policies", &[], json!({"col": "status", "op": "=", "val": val}))
                .unwrap_err();
            assert_eq!(err.kind, ValidationErrorKind::InvalidFilterValue);
        }
    }

    #[test]
    fn operators_are_a_closed_set() {
        let err = check("policies", &[], json!({"col": "status", "op": "LIKE", "val": "a%"}))
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::UnknownOperator);

        let err = check(
            "policies",
            &[],
            json!({"col": "status", "op": "= 'x' OR 1=1 --", "val": "a"}),
        )
        .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::UnknownOperator);
    }

    #[test]
    fn values_must_match_column_types() {
        let err = check(
            "claims",
            &[],
            json!({"col": "loss_date", "op": ">=", "val": "last year"}),
        )
        .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::ValueTypeMismatch);

        let err = check("claims", &[], json!({"col": "paid", "op": ">", "val": "1000"}))
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::ValueTypeMismatch);

        assert!(check("claims", &[], json!({"col": "paid", "op": ">", "val": 1000})).is_ok());
        assert!(check("claims", &[], json!({"col": "paid", "op": ">", "val": 12.5})).is_ok());
    }

    #[test]
    fn ilike_only_on_text() {
        let ok = check(
            "policies",
            &["policies->customers"],
            json!({"col": "customers.city", "op": "ilike", "val": "Cluj%"}),
        )
        .unwrap();
        assert_eq!(ok.op, Operator::ILike);

        let err = check(
            "policies",
            &[],
            json!({"col": "gross_premium", "op": "ILIKE", "val": "1%"}),
        )
        .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::OperatorNotApplicable);
    }

    #[test]
    fn timestamps_accept_rfc3339_and_dates() {
        assert!(is_timestamp("2024-03-01T10:00:00Z"));
        assert!(is_timestamp("2024-03-01 10:00:00"));
        assert!(is_timestamp("2024-03-01"));
        assert!(!is_timestamp("yesterday"));
    }
}
