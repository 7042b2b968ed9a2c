//! Aggregation expression grammar.
//!
//! Accepted form: `FUNC(*|column) [AS alias]`, where FUNC is one of
//! [`AggregateFunction`] (case-insensitive) and `*` only appears inside
//! `COUNT`. Anything else is rejected rather than passed through.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::ValidationError;
use sift_core::{AggregateFunction, is_identifier};

/// `name(` at the start of an expression.
static CALL_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*([^()]*?)\s*\)(?:\s+as\s+(.+?))?\s*$")
        .unwrap()
});

/// Argument of a parsed aggregation, before column qualification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawArgument {
    Star,
    Column(String),
}

/// A syntactically valid aggregation whose column is not yet qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAggregation {
    pub function: AggregateFunction,
    pub argument: RawArgument,
    pub alias: Option<String>,
}

/// Whether a select entry is a call to a supported aggregation function.
pub fn is_aggregate_call(text: &str) -> bool {
    CALL_PREFIX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|name| AggregateFunction::from_name(name.as_str()))
        .is_some()
}

/// Canonical text used to deduplicate hoisted expressions.
pub fn normalized_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Parse one aggregation expression.
pub fn parse(expression: &str) -> Result<ParsedAggregation, ValidationError> {
    let caps = EXPRESSION.captures(expression).ok_or_else(|| {
        ValidationError::malformed_aggregation(expression, "expected FUNC(column) [AS alias]")
    })?;

    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let function = AggregateFunction::from_name(name)
        .ok_or_else(|| ValidationError::unknown_aggregate_function(expression, name))?;

    let inner = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let argument = if inner == "*" {
        if function != AggregateFunction::Count {
            return Err(ValidationError::malformed_aggregation(
                expression,
                "'*' is only allowed inside COUNT",
            ));
        }
        RawArgument::Star
    } else if is_column_reference(inner) {
        RawArgument::Column(inner.to_string())
    } else if inner.is_empty() {
        return Err(ValidationError::malformed_aggregation(
            expression,
            "missing argument",
        ));
    } else {
        return Err(ValidationError::malformed_aggregation(
            expression,
            "argument must be a single column reference",
        ));
    };

    let alias = match caps.get(3) {
        Some(m) => {
            let alias = m.as_str();
            if !is_identifier(alias) {
                return Err(ValidationError::invalid_alias(alias));
            }
            Some(alias.to_string())
        }
        None => None,
    };

    Ok(ParsedAggregation {
        function,
        argument,
        alias,
    })
}

fn is_column_reference(text: &str) -> bool {
    match text.split_once('.') {
        Some((entity, column)) => is_identifier(entity) && is_identifier(column),
        None => is_identifier(text),
    }
}
