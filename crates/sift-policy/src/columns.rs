//! Column qualification.

use crate::error::ValidationError;
use crate::joins::JoinScope;
use sift_core::{ColumnRef, SchemaRegistry, is_identifier};

/// Rewrites column references into `entity.column` form against a join scope.
pub struct ColumnResolver<'a> {
    registry: &'a SchemaRegistry,
    scope: &'a JoinScope,
}

impl<'a> ColumnResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry, scope: &'a JoinScope) -> Self {
        Self { registry, scope }
    }

    /// Qualify a single reference.
    ///
    /// A qualified reference must name an allowlisted column of a reachable
    /// entity. A bare name must match exactly one reachable entity.
    pub fn qualify(&self, reference: &str) -> Result<ColumnRef, ValidationError> {
        let reference = reference.trim();

        if let Some((entity, column)) = ColumnRef::split_qualified(reference) {
            if !is_identifier(entity) || !is_identifier(column) {
                return Err(ValidationError::unknown_column(reference));
            }
            let known = self
                .registry
                .entity(entity)
                .map(|e| e.has_column(column))
                .unwrap_or(false);
            if !known {
                return Err(ValidationError::unknown_column(reference));
            }
            if !self.scope.contains(entity) {
                return Err(ValidationError::column_not_reachable(reference, entity));
            }
            return Ok(ColumnRef::new(entity, column));
        }

        if !is_identifier(reference) {
            return Err(ValidationError::unknown_column(reference));
        }

        let candidates: Vec<&str> = self
            .scope
            .entities()
            .iter()
            .filter(|entity| {
                self.registry
                    .entity(entity)
                    .map(|e| e.has_column(reference))
                    .unwrap_or(false)
            })
            .map(|entity| entity.as_str())
            .collect();

        match candidates.as_slice() {
            [] => Err(ValidationError::unknown_column(reference)),
            [entity] => Ok(ColumnRef::new(*entity, reference)),
            many => {
                let qualified: Vec<String> = many
                    .iter()
                    .map(|entity| format!("{}.{}", entity, reference))
                    .collect();
                Err(ValidationError::ambiguous_column(reference, &qualified))
            }
        }
    }

    pub fn qualify_all(&self, references: &[String]) -> Result<Vec<ColumnRef>, ValidationError> {
        references.iter().map(|r| self.qualify(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;

    fn scope(registry: &SchemaRegistry, base: &str, joins: &[&str]) -> JoinScope {
        let joins: Vec<String> = joins.iter().map(|s| s.to_string()).collect();
        JoinScope::resolve(registry, base, &joins).unwrap()
    }

    #[test]
    fn qualifies_bare_names_in_scope() {
        let reg = SchemaRegistry::builtin().unwrap();
        let scope = scope(&reg, "policies", &["policies->customers"]);
        let resolver = ColumnResolver::new(&reg, &scope);

        assert_eq!(
            resolver.qualify("city").unwrap(),
            ColumnRef::new("customers", "city")
        );
        assert_eq!(
            resolver.qualify(" gross_premium ").unwrap(),
            ColumnRef::new("policies", "gross_premium")
        );
    }

    #[test]
    fn shared_column_is_ambiguous_until_qualified() {
        let reg = SchemaRegistry::builtin().unwrap();
        let scope = scope(&reg, "claims", &["claims->policies"]);
        let resolver = ColumnResolver::new(&reg, &scope);

        let err = resolver.qualify("status").unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::AmbiguousColumn);
        assert!(err.message.contains("claims.status"));
        assert!(err.message.contains("policies.status"));

        assert_eq!(
            resolver.qualify("claims.status").unwrap(),
            ColumnRef::new("claims", "status")
        );
    }

    #[test]
    fn rejects_unknown_and_unreachable_columns() {
        let reg = SchemaRegistry::builtin().unwrap();
        let scope = scope(&reg, "policies", &[]);
        let resolver = ColumnResolver::new(&reg, &scope);

        assert_eq!(
            resolver.qualify("city").unwrap_err().kind,
            ValidationErrorKind::UnknownColumn
        );
        assert_eq!(
            resolver.qualify("customers.city").unwrap_err().kind,
            ValidationErrorKind::ColumnNotReachable
        );
        assert_eq!(
            resolver.qualify("customers.password").unwrap_err().kind,
            ValidationErrorKind::UnknownColumn
        );
        assert_eq!(
            resolver.qualify("status; drop table x").unwrap_err().kind,
            ValidationErrorKind::UnknownColumn
        );
        assert_eq!(
            resolver.qualify("policies.status.x").unwrap_err().kind,
            ValidationErrorKind::UnknownColumn
        );
    }
}
