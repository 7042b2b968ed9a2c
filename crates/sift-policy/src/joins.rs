//! Join reachability.
//!
//! The set of entities a Plan may reference is the base entity plus whatever
//! the Plan's own join list connects to it. Edges come only from the registry;
//! the shorthand text is used as a lookup key and never reaches query text.

use crate::error::ValidationError;
use sift_core::{JoinEdge, JoinStep, SchemaRegistry};

/// Entities in scope for one Plan, and the join steps that brought them in.
#[derive(Debug, Clone)]
pub struct JoinScope {
    base: String,
    /// Base first, then entities in the order their joins were resolved.
    reachable: Vec<String>,
    steps: Vec<JoinStep>,
}

impl JoinScope {
    /// Resolve a Plan's join shorthands against the registry.
    ///
    /// Reachability is a fixpoint: an edge is accepted once one of its
    /// endpoints is in scope, which lets the planner list joins in any order.
    /// Edges that never connect are rejected, as are repeated edges and edges
    /// whose endpoints are both in scope already.
    pub fn resolve(
        registry: &SchemaRegistry,
        base: &str,
        joins: &[String],
    ) -> Result<Self, ValidationError> {
        if registry.entity(base).is_none() {
            return Err(ValidationError::unknown_entity(base));
        }

        let mut pending: Vec<&JoinEdge> = Vec::with_capacity(joins.len());
        for shorthand in joins {
            let edge = registry
                .join(shorthand)
                .ok_or_else(|| ValidationError::join_not_allowed(shorthand.trim()))?;
            if pending.iter().any(|e| *e == edge) {
                return Err(ValidationError::duplicate_join(&edge.shorthand()));
            }
            pending.push(edge);
        }

        let mut scope = Self {
            base: base.to_string(),
            reachable: vec![base.to_string()],
            steps: Vec::with_capacity(pending.len()),
        };

        loop {
            let before = pending.len();
            let mut unresolved = Vec::with_capacity(pending.len());

            for edge in pending {
                let from_in = scope.contains(&edge.from.entity);
                let to_in = scope.contains(&edge.to.entity);
                let entity = match (from_in, to_in) {
                    (true, true) => return Err(ValidationError::duplicate_join(&edge.shorthand())),
                    (true, false) => &edge.to.entity,
                    (false, true) => &edge.from.entity,
                    (false, false) => {
                        unresolved.push(edge);
                        continue;
                    }
                };
                scope.reachable.push(entity.clone());
                scope.steps.push(JoinStep {
                    edge: edge.shorthand(),
                    entity: entity.clone(),
                });
            }

            pending = unresolved;
            if pending.is_empty() {
                break;
            }
            if pending.len() == before {
                return Err(ValidationError::join_unreachable(
                    &pending[0].shorthand(),
                    base,
                ));
            }
        }

        tracing::debug!(
            base = %scope.base,
            reachable = ?scope.reachable,
            "Join scope resolved"
        );

        Ok(scope)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.reachable.iter().any(|e| e == entity)
    }

    pub fn entities(&self) -> &[String] {
        &self.reachable
    }

    pub fn steps(&self) -> &[JoinStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<JoinStep> {
        self.steps
    }
}
