//! Compiled query handed to the execution collaborator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::ColumnType;
use crate::value::BoundValue;

/// Parameterized query text plus the values bound to its placeholders.
///
/// Placeholders use the `:name` form. Every filter value lives in `params`;
/// the only literal in `sql` is the clamped row limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: BTreeMap<String, BoundValue>,
    /// Declared type of the column each placeholder is compared against,
    /// recorded for non-text columns only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub param_types: BTreeMap<String, ColumnType>,
}

impl CompiledQuery {
    /// Placeholder names in the order they appear in the query text.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<(usize, &str)> = self
            .params
            .keys()
            .filter_map(|name| {
                find_placeholder(&self.sql, name).map(|pos| (pos, name.as_str()))
            })
            .collect();
        names.sort();
        names.into_iter().map(|(_, name)| name).collect()
    }
}

/// Byte offset of `:name` in `sql`, requiring a non-identifier character (or
/// end of text) after the name so `:p1` does not match inside `:p10`.
pub fn find_placeholder(sql: &str, name: &str) -> Option<usize> {
    let needle = format!(":{}", name);
    let mut from = 0;
    while let Some(rel) = sql[from..].find(&needle) {
        let pos = from + rel;
        let end = pos + needle.len();
        let boundary = sql[end..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'));
        if boundary {
            return Some(pos);
        }
        from = end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarValue;

    #[test]
    fn placeholders_in_text_order() {
        let mut params = BTreeMap::new();
        params.insert("p10".to_string(), BoundValue::Scalar(ScalarValue::Integer(1)));
        params.insert("p1".to_string(), BoundValue::Scalar(ScalarValue::Integer(2)));
        params.insert("p0a".to_string(), BoundValue::Scalar(ScalarValue::Integer(3)));
        let q = CompiledQuery {
            sql: "WHERE a BETWEEN :p0a AND :p0b AND b = :p1 AND c = :p10".to_string(),
            params,
            param_types: BTreeMap::new(),
        };
        assert_eq!(q.placeholders(), vec!["p0a", "p1", "p10"]);
    }

    #[test]
    fn placeholder_boundary() {
        assert_eq!(find_placeholder("x = :p10", "p1"), None);
        assert_eq!(find_placeholder("x = :p1", "p1"), Some(4));
        assert_eq!(find_placeholder("x = ANY(:p1)", "p1"), Some(8));
    }
}
