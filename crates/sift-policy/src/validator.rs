//! Main validator that turns a raw Plan into a normalized Plan.
//!
//! The `PlanValidator` is the entry point for every Plan the planner proposes.
//! It runs, in order:
//!
//! 1. **Reachability** - resolve joins against the registry from the base entity
//! 2. **Aggregation hoisting** - move aggregate calls out of the select list
//! 3. **Column qualification** - select and group-by columns
//! 4. **Filters** - operator, value shape and value type
//! 5. **Aggregation grammar** - function, argument and alias
//! 6. **Ordering** - aggregation aliases stay bare, everything else is qualified
//! 7. **Grouping completeness** - non-aggregated output must be grouped
//! 8. **Sensitivity scan** and **limit clamping**

use std::collections::HashSet;

use crate::aggregation::{self, RawArgument};
use crate::columns::ColumnResolver;
use crate::error::ValidationError;
use crate::filters::FilterValidator;
use crate::joins::JoinScope;
use crate::limit::clamp_limit;
use sift_core::{
    AggregateArg, Aggregation, ColumnRef, Direction, NormalizedPlan, OrderSpec, OrderTarget,
    RawOrder, RawPlan, SchemaRegistry,
};

/// Validates raw Plans against a schema registry.
pub struct PlanValidator<'a> {
    registry: &'a SchemaRegistry,
    filter_validator: FilterValidator<'a>,
}

impl<'a> PlanValidator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            filter_validator: FilterValidator::new(registry),
        }
    }

    /// Validate and normalize a raw Plan.
    ///
    /// Returns the normalized Plan, or the first violation found. Nothing is
    /// silently dropped; only the limit is ever repaired.
    pub fn validate(&self, raw: &RawPlan) -> Result<NormalizedPlan, ValidationError> {
        match self.normalize(raw) {
            Ok(plan) => {
                tracing::debug!(
                    base = %plan.base,
                    joins = plan.joins.len(),
                    filters = plan.filters.len(),
                    aggregations = plan.aggregations.len(),
                    limit = plan.limit,
                    contains_sensitive = plan.contains_sensitive,
                    "Plan validated"
                );
                Ok(plan)
            }
            Err(err) => {
                tracing::warn!(
                    kind = ?err.kind,
                    reference = err.reference.as_deref().unwrap_or(""),
                    "Plan rejected: {}",
                    err.message
                );
                Err(err)
            }
        }
    }

    fn normalize(&self, raw: &RawPlan) -> Result<NormalizedPlan, ValidationError> {
        // 1. Reachability
        let scope = JoinScope::resolve(self.registry, raw.view.trim(), &raw.joins)?;
        let resolver = ColumnResolver::new(self.registry, &scope);

        // 2. Hoisting
        let (select_refs, aggregation_exprs) = hoist_aggregations(&raw.select, &raw.aggregations);
        tracing::debug!(
            select = select_refs.len(),
            aggregations = aggregation_exprs.len(),
            "Aggregations hoisted"
        );

        // 3. Qualification
        let select = resolver.qualify_all(&select_refs)?;
        let group_by = resolver.qualify_all(&raw.group_by)?;

        // 4. Filters
        let filters = raw
            .filters
            .iter()
            .map(|f| self.filter_validator.validate(f, &resolver))
            .collect::<Result<Vec<_>, _>>()?;

        // 5. Aggregations
        let aggregations = validate_aggregations(&aggregation_exprs, &resolver)?;

        // 6. Ordering
        let aliases: Vec<&str> = aggregations
            .iter()
            .filter_map(|a| a.alias.as_deref())
            .collect();
        let order_by = raw
            .order_by
            .iter()
            .map(|o| order_spec(o, &aliases, &resolver))
            .collect::<Result<Vec<_>, _>>()?;

        // 7. Grouping
        check_grouping(scope.base(), &select, &group_by, &order_by, &aggregations)?;

        // 8. Sensitivity and limit
        let sensitive_outputs: Vec<String> = aggregations
            .iter()
            .filter(|a| a.function.passes_values_through())
            .filter(|a| a.column().is_some_and(|c| self.registry.is_sensitive(c)))
            .map(|a| a.output_name())
            .collect();

        let limit = clamp_limit(
            raw.limit.as_ref(),
            self.registry.default_limit(),
            self.registry.max_limit(),
        );

        let mut plan = NormalizedPlan {
            base: scope.base().to_string(),
            select,
            filters,
            joins: scope.steps().to_vec(),
            group_by,
            aggregations,
            order_by,
            limit,
            contains_sensitive: false,
            sensitive_outputs,
        };
        plan.contains_sensitive = plan
            .referenced_columns()
            .into_iter()
            .any(|c| self.registry.is_sensitive(c));

        Ok(plan)
    }
}

/// Split select entries into plain columns and aggregate calls, appending the
/// calls to the aggregation list. Expressions are deduplicated by normalized text.
fn hoist_aggregations(select: &[String], aggregations: &[String]) -> (Vec<String>, Vec<String>) {
    let mut columns = Vec::with_capacity(select.len());
    let mut exprs: Vec<String> = Vec::with_capacity(aggregations.len());
    let mut seen = HashSet::new();

    for expr in aggregations {
        if seen.insert(aggregation::normalized_text(expr)) {
            exprs.push(expr.clone());
        }
    }

    for entry in select {
        if aggregation::is_aggregate_call(entry) {
            if seen.insert(aggregation::normalized_text(entry)) {
                exprs.push(entry.clone());
            }
        } else {
            columns.push(entry.clone());
        }
    }

    (columns, exprs)
}

fn validate_aggregations(
    exprs: &[String],
    resolver: &ColumnResolver<'_>,
) -> Result<Vec<Aggregation>, ValidationError> {
    let mut out: Vec<Aggregation> = Vec::with_capacity(exprs.len());

    for expr in exprs {
        let parsed = aggregation::parse(expr)?;
        let argument = match parsed.argument {
            RawArgument::Star => AggregateArg::Star,
            RawArgument::Column(reference) => AggregateArg::Column(resolver.qualify(&reference)?),
        };

        if let Some(alias) = &parsed.alias
            && out.iter().any(|a| a.alias.as_deref() == Some(alias.as_str()))
        {
            return Err(ValidationError::duplicate_alias(alias));
        }

        out.push(Aggregation {
            function: parsed.function,
            argument,
            alias: parsed.alias,
        });
    }

    Ok(out)
}

fn order_spec(
    raw: &RawOrder,
    aliases: &[&str],
    resolver: &ColumnResolver<'_>,
) -> Result<OrderSpec, ValidationError> {
    let direction = match &raw.dir {
        None => Direction::Asc,
        Some(dir) => {
            Direction::parse(dir).ok_or_else(|| ValidationError::invalid_direction(&raw.col, dir))?
        }
    };

    let col = raw.col.trim();
    let target = if aliases.contains(&col) {
        OrderTarget::Alias(col.to_string())
    } else {
        OrderTarget::Column(resolver.qualify(col)?)
    };

    Ok(OrderSpec { target, direction })
}

/// When the Plan aggregates or groups, every plain output and sort column must
/// be grouped. A grouped Plan with no outputs would select `base.*`, which is
/// never grouped.
fn check_grouping(
    base: &str,
    select: &[ColumnRef],
    group_by: &[ColumnRef],
    order_by: &[OrderSpec],
    aggregations: &[Aggregation],
) -> Result<(), ValidationError> {
    if aggregations.is_empty() && group_by.is_empty() {
        return Ok(());
    }
    if select.is_empty() && aggregations.is_empty() {
        return Err(ValidationError::ungrouped_column(&format!("{}.*", base)));
    }

    let ordered = order_by.iter().filter_map(|o| match &o.target {
        OrderTarget::Column(c) => Some(c),
        OrderTarget::Alias(_) => None,
    });

    for column in select.iter().chain(ordered) {
        if !group_by.contains(column) {
            return Err(ValidationError::ungrouped_column(&column.to_string()));
        }
    }

    Ok(())
}
