//! Positional placeholder rendering.
//!
//! The Postgres wire protocol binds `$1..$n`, not names. Rewriting happens on
//! compiled text only, after every `:name` has been bound.

use crate::error::CompileError;
use sift_core::{BoundValue, CompiledQuery};

/// Query text with `$n` placeholders and its ordered parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalQuery {
    pub sql: String,
    pub params: Vec<BoundValue>,
    /// Placeholder name for each entry of `params`.
    pub names: Vec<String>,
}

pub trait ToPositional {
    /// Rewrite `:name` placeholders to `$1..$n` in order of first appearance.
    fn to_positional(&self) -> Result<PositionalQuery, CompileError>;
}

impl ToPositional for CompiledQuery {
    fn to_positional(&self) -> Result<PositionalQuery, CompileError> {
        let mut sql = String::with_capacity(self.sql.len());
        let mut names: Vec<String> = Vec::new();
        let mut params = Vec::new();

        let mut chars = self.sql.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != ':' {
                sql.push(c);
                continue;
            }

            // `::` is a cast, not a placeholder.
            if let Some(&(_, ':')) = chars.peek() {
                chars.next();
                sql.push_str("::");
                continue;
            }

            let start = i + 1;
            let mut end = start;
            while let Some(&(j, n)) = chars.peek() {
                let valid = if j == start {
                    n.is_ascii_alphabetic() || n == '_'
                } else {
                    n.is_ascii_alphanumeric() || n == '_'
                };
                if !valid {
                    break;
                }
                end = j + n.len_utf8();
                chars.next();
            }

            if end == start {
                sql.push(c);
                continue;
            }

            let name = &self.sql[start..end];
            let value = self
                .params
                .get(name)
                .ok_or_else(|| CompileError::UnboundPlaceholder(name.to_string()))?;

            let position = match names.iter().position(|n| n == name) {
                Some(p) => p + 1,
                None => {
                    names.push(name.to_string());
                    params.push(value.clone());
                    names.len()
                }
            };

            sql.push('$');
            sql.push_str(&position.to_string());
            if let Some(cast) = self.param_types.get(name).and_then(|t| t.pg_cast()) {
                sql.push_str("::");
                sql.push_str(cast);
                if matches!(value, BoundValue::List(_)) {
                    sql.push_str("[]");
                }
            }
        }

        Ok(PositionalQuery { sql, params, names })
    }
}
