//! Validation error types for Plan checking.
//!
//! Every rejection names its kind, a human-readable message and, where there
//! is one, the offending reference exactly as the planner wrote it.

use serde::Serialize;
use std::fmt;

/// Error type for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// The kind of validation error.
    pub kind: ValidationErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// The offending entity, column, join, operator or expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            reference: None,
        }
    }

    fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    // =========================================================================
    // SCHEMA VIOLATIONS
    // =========================================================================

    pub fn unknown_entity(entity: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnknownEntity,
            format!("Unknown entity '{}'", entity),
        )
        .with_reference(entity)
    }

    pub fn unknown_column(column: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnknownColumn,
            format!("Unknown column '{}'", column),
        )
        .with_reference(column)
    }

    /// Qualified column whose entity is not joined into the plan.
    pub fn column_not_reachable(column: &str, entity: &str) -> Self {
        Self::new(
            ValidationErrorKind::ColumnNotReachable,
            format!(
                "Column '{}' is not reachable: entity '{}' is not joined",
                column, entity
            ),
        )
        .with_reference(column)
    }

    pub fn join_not_allowed(edge: &str) -> Self {
        Self::new(
            ValidationErrorKind::JoinNotAllowed,
            format!("Join not allowed: '{}'", edge),
        )
        .with_reference(edge)
    }

    /// Allowed edge that does not connect to the base entity through the plan's joins.
    pub fn join_unreachable(edge: &str, base: &str) -> Self {
        Self::new(
            ValidationErrorKind::JoinUnreachable,
            format!(
                "Join '{}' does not connect to base entity '{}' or any joined entity",
                edge, base
            ),
        )
        .with_reference(edge)
    }

    pub fn duplicate_join(edge: &str) -> Self {
        Self::new(
            ValidationErrorKind::DuplicateJoin,
            format!(
                "Join '{}' is repeated or both of its entities are already joined",
                edge
            ),
        )
        .with_reference(edge)
    }

    pub fn unknown_operator(op: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnknownOperator,
            format!("Unknown operator '{}'", op),
        )
        .with_reference(op)
    }

    pub fn operator_not_allowed(op: &str) -> Self {
        Self::new(
            ValidationErrorKind::OperatorNotAllowed,
            format!("Operator not allowed: '{}'", op),
        )
        .with_reference(op)
    }

    pub fn unknown_aggregate_function(expression: &str, function: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnknownAggregateFunction,
            format!(
                "Aggregation function '{}' is not supported in '{}' (allowed: count, sum, avg, min, max)",
                function, expression
            ),
        )
        .with_reference(expression)
    }

    // =========================================================================
    // AMBIGUITY
    // =========================================================================

    pub fn ambiguous_column(column: &str, candidates: &[String]) -> Self {
        Self::new(
            ValidationErrorKind::AmbiguousColumn,
            format!(
                "Ambiguous column '{}' across [{}]; qualify it",
                column,
                candidates.join(", ")
            ),
        )
        .with_reference(column)
    }

    // =========================================================================
    // SHAPE VIOLATIONS
    // =========================================================================

    pub fn invalid_filter_value(column: &str, op: &str, expected: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidFilterValue,
            format!("Filter on '{}' with {} requires {}", column, op, expected),
        )
        .with_reference(column)
    }

    pub fn value_type_mismatch(column: &str, expected: &str, found: &str) -> Self {
        Self::new(
            ValidationErrorKind::ValueTypeMismatch,
            format!(
                "Filter value for '{}' must be {}, found {}",
                column, expected, found
            ),
        )
        .with_reference(column)
    }

    pub fn operator_not_applicable(op: &str, column: &str, column_type: &str) -> Self {
        Self::new(
            ValidationErrorKind::OperatorNotApplicable,
            format!(
                "Operator {} cannot be applied to {} column '{}'",
                op, column_type, column
            ),
        )
        .with_reference(column)
    }

    pub fn malformed_aggregation(expression: &str, reason: &str) -> Self {
        Self::new(
            ValidationErrorKind::MalformedAggregation,
            format!("Malformed aggregation '{}': {}", expression, reason),
        )
        .with_reference(expression)
    }

    pub fn invalid_alias(alias: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidAlias,
            format!(
                "Aggregation alias '{}' must be a plain identifier (letters, digits, underscore)",
                alias
            ),
        )
        .with_reference(alias)
    }

    pub fn duplicate_alias(alias: &str) -> Self {
        Self::new(
            ValidationErrorKind::DuplicateAlias,
            format!("Aggregation alias '{}' is used more than once", alias),
        )
        .with_reference(alias)
    }

    pub fn ungrouped_column(column: &str) -> Self {
        Self::new(
            ValidationErrorKind::UngroupedColumn,
            format!(
                "Selected columns must be grouped: '{}' is not in group_by",
                column
            ),
        )
        .with_reference(column)
    }

    pub fn invalid_direction(column: &str, direction: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidDirection,
            format!(
                "Sort direction '{}' for '{}' must be 'asc' or 'desc'",
                direction, column
            ),
        )
        .with_reference(column)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Broad failure classes, for callers that only need to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Unknown entity, column, join, operator or aggregation function.
    Schema,
    /// Bare column resolvable to more than one reachable entity.
    Ambiguity,
    /// Wrong filter arity or type, malformed aggregation, ungrouped column.
    Shape,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    // =========================================================================
    // Schema violations
    // =========================================================================
    UnknownEntity,
    UnknownColumn,
    ColumnNotReachable,
    JoinNotAllowed,
    JoinUnreachable,
    DuplicateJoin,
    UnknownOperator,
    /// Operator parses but the registry does not allow it.
    OperatorNotAllowed,
    UnknownAggregateFunction,

    // =========================================================================
    // Ambiguity
    // =========================================================================
    AmbiguousColumn,

    // =========================================================================
    // Shape violations
    // =========================================================================
    /// Value slot does not match the operator (arity, null, nested arrays).
    InvalidFilterValue,
    /// Value does not match the column's declared type.
    ValueTypeMismatch,
    /// e.g. ILIKE on a numeric column.
    OperatorNotApplicable,
    MalformedAggregation,
    InvalidAlias,
    DuplicateAlias,
    UngroupedColumn,
    InvalidDirection,
}

impl ValidationErrorKind {
    pub fn category(&self) -> ErrorCategory {
        use ValidationErrorKind::*;

        match self {
            UnknownEntity | UnknownColumn | ColumnNotReachable | JoinNotAllowed
            | JoinUnreachable | DuplicateJoin | UnknownOperator | OperatorNotAllowed
            | UnknownAggregateFunction => ErrorCategory::Schema,
            AmbiguousColumn => ErrorCategory::Ambiguity,
            InvalidFilterValue | ValueTypeMismatch | OperatorNotApplicable
            | MalformedAggregation | InvalidAlias | DuplicateAlias | UngroupedColumn
            | InvalidDirection => ErrorCategory::Shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_the_offending_reference() {
        let err = ValidationError::ambiguous_column(
            "status",
            &["claims.status".to_string(), "policies.status".to_string()],
        );
        assert_eq!(err.kind, ValidationErrorKind::AmbiguousColumn);
        assert_eq!(err.category(), ErrorCategory::Ambiguity);
        assert_eq!(err.reference.as_deref(), Some("status"));
        assert_eq!(
            err.to_string(),
            "Ambiguous column 'status' across [claims.status, policies.status]; qualify it"
        );
    }

    #[test]
    fn error_serializes_with_snake_case_kind() {
        let err = ValidationError::join_not_allowed("customers->claims");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "join_not_allowed");
        assert_eq!(json["reference"], "customers->claims");
    }
}
