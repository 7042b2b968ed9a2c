//! Statement guard.
//!
//! Re-parses compiled query text and checks that it is exactly one plain
//! `SELECT` whose FROM and JOIN relations are all registry entities. The
//! compiler never parses user SQL; this is a check on its own output.

use std::collections::HashSet;

use sqlparser::ast::{SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::CompileError;
use sift_core::SchemaRegistry;

/// Checks compiled SQL against the registry's set of relations.
pub struct StatementGuard {
    dialect: PostgreSqlDialect,
    /// Relations as they appear in compiled text, e.g. `core."claims"`.
    allowed: HashSet<String>,
}

impl StatementGuard {
    pub fn new(registry: &SchemaRegistry) -> Self {
        let allowed = registry
            .entities()
            .iter()
            .map(|e| format!("{}.\"{}\"", e.schema, e.name))
            .collect();
        Self {
            dialect: PostgreSqlDialect {},
            allowed,
        }
    }

    /// Check one compiled statement. Returns the relations it reads.
    pub fn check(&self, sql: &str) -> Result<Vec<String>, CompileError> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| CompileError::ParseError(e.to_string()))?;

        let [statement] = statements.as_slice() else {
            return Err(CompileError::Guard(format!(
                "expected one statement, found {}",
                statements.len()
            )));
        };

        let Statement::Query(query) = statement else {
            return Err(CompileError::Guard("statement is not a query".to_string()));
        };
        if query.with.is_some() {
            return Err(CompileError::Guard("WITH clauses are not emitted".to_string()));
        }
        let SetExpr::Select(select) = query.body.as_ref() else {
            return Err(CompileError::Guard("query body is not a plain SELECT".to_string()));
        };

        let mut relations = Vec::new();
        for table_with_joins in &select.from {
            self.visit_table_with_joins(table_with_joins, &mut relations)?;
        }

        if relations.is_empty() {
            return Err(CompileError::Guard("query reads no relation".to_string()));
        }
        for relation in &relations {
            if !self.allowed.contains(relation) {
                return Err(CompileError::Guard(format!(
                    "relation {} is not a registry entity",
                    relation
                )));
            }
        }

        Ok(relations)
    }

    fn visit_table_with_joins(
        &self,
        table_with_joins: &TableWithJoins,
        relations: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        relations.push(relation_name(&table_with_joins.relation)?);
        for join in &table_with_joins.joins {
            relations.push(relation_name(&join.relation)?);
        }
        Ok(())
    }
}

fn relation_name(factor: &TableFactor) -> Result<String, CompileError> {
    match factor {
        TableFactor::Table { name, .. } => Ok(name.to_string()),
        _ => Err(CompileError::Guard(
            "derived tables and table functions are not emitted".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> StatementGuard {
        StatementGuard::new(&SchemaRegistry::builtin().unwrap())
    }

    #[test]
    fn accepts_compiled_select() {
        let relations = guard()
            .check(
                "SELECT policies.status FROM core.\"policies\" policies \
                 JOIN core.\"customers\" customers ON policies.customer_id = customers.customer_id \
                 WHERE customers.city ILIKE :p0 LIMIT 25",
            )
            .unwrap();
        assert_eq!(relations, vec!["core.\"policies\"", "core.\"customers\""]);
    }

    #[test]
    fn rejects_multiple_statements() {
        let err = guard()
            .check("SELECT claims.paid FROM core.\"claims\" claims; DELETE FROM core.\"claims\"")
            .unwrap_err();
        assert!(matches!(err, CompileError::Guard(_)));
    }

    #[test]
    fn rejects_non_select() {
        let err = guard().check("DELETE FROM core.\"claims\"").unwrap_err();
        assert!(matches!(err, CompileError::Guard(_)));
    }

    #[test]
    fn rejects_unregistered_relations() {
        let err = guard()
            .check("SELECT usename FROM pg_catalog.\"pg_user\" u")
            .unwrap_err();
        assert!(matches!(err, CompileError::Guard(_)));

        // Unquoted spelling is not what the compiler emits.
        let err = guard().check("SELECT * FROM core.claims").unwrap_err();
        assert!(matches!(err, CompileError::Guard(_)));
    }

    #[test]
    fn rejects_subqueries_in_from() {
        let err = guard()
            .check("SELECT t.x FROM (SELECT 1 AS x) t")
            .unwrap_err();
        assert!(matches!(err, CompileError::Guard(_)));
    }
}
