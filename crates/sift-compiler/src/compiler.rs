//! Query rendering.
//!
//! A pure function of (normalized Plan, registry) to (query text, bindings).
//! Identifiers come only from the registry or from aliases that passed the
//! identifier check; every filter value is bound to a placeholder named after
//! its filter's position. The clamped limit is the only inlined literal.

use std::collections::BTreeMap;

use crate::error::CompileError;
use crate::guard::StatementGuard;
use sift_core::{
    BoundValue, ColumnRef, ColumnType, CompiledQuery, Filter, FilterValue, NormalizedPlan,
    OrderTarget, SchemaRegistry, is_identifier,
};

/// Renders normalized Plans into parameterized SQL.
pub struct QueryCompiler<'a> {
    registry: &'a SchemaRegistry,
    guard: StatementGuard,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            guard: StatementGuard::new(registry),
        }
    }

    /// Compile a normalized Plan.
    ///
    /// Clauses are emitted in fixed SQL order and joined by single spaces;
    /// empty clauses are omitted.
    pub fn compile(&self, plan: &NormalizedPlan) -> Result<CompiledQuery, CompileError> {
        self.check_references(plan)?;

        let mut params = BTreeMap::new();
        let mut param_types = BTreeMap::new();

        let clauses = [
            self.select_clause(plan),
            self.from_clause(plan)?,
            self.join_clauses(plan)?,
            self.where_clause(plan, &mut params, &mut param_types)?,
            group_by_clause(plan),
            order_by_clause(plan),
            format!("LIMIT {}", plan.limit),
        ];

        let sql = clauses
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        self.guard.check(&sql)?;

        tracing::debug!(
            base = %plan.base,
            params = params.len(),
            sql = %sql,
            "Plan compiled"
        );

        Ok(CompiledQuery {
            sql,
            params,
            param_types,
        })
    }

    /// Every name that ends up in query text must come from the registry.
    fn check_references(&self, plan: &NormalizedPlan) -> Result<(), CompileError> {
        for entity in plan.entities() {
            if self.registry.entity(entity).is_none() {
                return Err(CompileError::UnknownEntity(entity.to_string()));
            }
        }

        for column in plan.referenced_columns() {
            if self.registry.column_type(column).is_none() {
                return Err(CompileError::UnknownColumn(column.to_string()));
            }
        }

        let aliases = plan
            .aggregations
            .iter()
            .filter_map(|a| a.alias.as_deref())
            .chain(plan.order_by.iter().filter_map(|o| match &o.target {
                OrderTarget::Alias(a) => Some(a.as_str()),
                OrderTarget::Column(_) => None,
            }));
        for alias in aliases {
            if !is_identifier(alias) {
                return Err(CompileError::InvalidAlias(alias.to_string()));
            }
        }

        let max = self.registry.max_limit();
        if plan.limit == 0 || plan.limit > max {
            return Err(CompileError::LimitOutOfRange {
                limit: plan.limit,
                max,
            });
        }

        Ok(())
    }

    fn select_clause(&self, plan: &NormalizedPlan) -> String {
        let items: Vec<String> = plan
            .select
            .iter()
            .map(ColumnRef::to_string)
            .chain(plan.aggregations.iter().map(|a| a.to_sql()))
            .collect();

        if items.is_empty() {
            format!("SELECT {}.*", plan.base)
        } else {
            format!("SELECT {}", items.join(", "))
        }
    }

    fn from_clause(&self, plan: &NormalizedPlan) -> Result<String, CompileError> {
        let table = self
            .registry
            .qualified_table_ref(&plan.base)
            .map_err(|_| CompileError::UnknownEntity(plan.base.clone()))?;
        Ok(format!("FROM {}", table))
    }

    fn join_clauses(&self, plan: &NormalizedPlan) -> Result<String, CompileError> {
        let mut clauses = Vec::with_capacity(plan.joins.len());
        for step in &plan.joins {
            let edge = self
                .registry
                .join(&step.edge)
                .ok_or_else(|| CompileError::UnknownJoin(step.edge.clone()))?;
            if edge.other_side(&step.entity).is_none() {
                return Err(CompileError::UnknownJoin(step.edge.clone()));
            }
            let table = self
                .registry
                .qualified_table_ref(&step.entity)
                .map_err(|_| CompileError::UnknownEntity(step.entity.clone()))?;
            clauses.push(format!("JOIN {} ON {}", table, edge.on_clause()));
        }
        Ok(clauses.join(" "))
    }

    fn where_clause(
        &self,
        plan: &NormalizedPlan,
        params: &mut BTreeMap<String, BoundValue>,
        param_types: &mut BTreeMap<String, ColumnType>,
    ) -> Result<String, CompileError> {
        if plan.filters.is_empty() {
            return Ok(String::new());
        }

        let mut predicates = Vec::with_capacity(plan.filters.len());
        for (i, filter) in plan.filters.iter().enumerate() {
            let column_type = self
                .registry
                .column_type(&filter.column)
                .ok_or_else(|| CompileError::UnknownColumn(filter.column.to_string()))?;

            let (predicate, bindings) = render_filter(i, filter);
            for (name, value) in bindings {
                if column_type != ColumnType::Text {
                    param_types.insert(name.clone(), column_type);
                }
                params.insert(name, value);
            }
            predicates.push(predicate);
        }

        Ok(format!("WHERE {}", predicates.join(" AND ")))
    }
}

/// Predicate text for filter `i` and the values it binds.
fn render_filter(i: usize, filter: &Filter) -> (String, Vec<(String, BoundValue)>) {
    let column = &filter.column;
    match &filter.value {
        FilterValue::Scalar(v) => {
            let name = format!("p{}", i);
            (
                format!("{} {} :{}", column, filter.op.as_sql(), name),
                vec![(name, BoundValue::Scalar(v.clone()))],
            )
        }
        FilterValue::Range(start, end) => {
            let (a, b) = (format!("p{}a", i), format!("p{}b", i));
            (
                format!("{} BETWEEN :{} AND :{}", column, a, b),
                vec![
                    (a, BoundValue::Scalar(start.clone())),
                    (b, BoundValue::Scalar(end.clone())),
                ],
            )
        }
        FilterValue::List(items) => {
            let name = format!("p{}", i);
            (
                format!("{} = ANY(:{})", column, name),
                vec![(name, BoundValue::List(items.clone()))],
            )
        }
    }
}

fn group_by_clause(plan: &NormalizedPlan) -> String {
    if plan.group_by.is_empty() {
        return String::new();
    }
    let columns: Vec<String> = plan.group_by.iter().map(ColumnRef::to_string).collect();
    format!("GROUP BY {}", columns.join(", "))
}

fn order_by_clause(plan: &NormalizedPlan) -> String {
    if plan.order_by.is_empty() {
        return String::new();
    }
    let items: Vec<String> = plan
        .order_by
        .iter()
        .map(|o| format!("{} {}", o.target, o.direction.as_sql()))
        .collect();
    format!("ORDER BY {}", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sift_core::{
        AggregateArg, AggregateFunction, Aggregation, Direction, JoinStep, Operator, OrderSpec,
        ScalarValue,
    };

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().unwrap()
    }

    fn base_plan(base: &str) -> NormalizedPlan {
        NormalizedPlan {
            base: base.to_string(),
            select: vec![],
            filters: vec![],
            joins: vec![],
            group_by: vec![],
            aggregations: vec![],
            order_by: vec![],
            limit: 50,
            contains_sensitive: false,
            sensitive_outputs: vec![],
        }
    }

    fn text(s: &str) -> ScalarValue {
        ScalarValue::Text(s.to_string())
    }

    #[test]
    fn empty_select_falls_back_to_star() {
        let reg = registry();
        let q = QueryCompiler::new(&reg).compile(&base_plan("claims")).unwrap();
        assert_eq!(q.sql, "SELECT claims.* FROM core.\"claims\" claims LIMIT 50");
        assert!(q.params.is_empty());
    }

    #[test]
    fn filter_values_are_always_bound() {
        let reg = registry();
        let mut plan = base_plan("claims");
        plan.select = vec![ColumnRef::new("claims", "claim_id")];
        plan.filters = vec![
            Filter {
                column: ColumnRef::new("claims", "loss_date"),
                op: Operator::Between,
                value: FilterValue::Range(text("2024-01-01"), text("2024-12-31")),
            },
            Filter {
                column: ColumnRef::new("claims", "peril"),
                op: Operator::In,
                value: FilterValue::List(vec![text("hail"), text("flood")]),
            },
            Filter {
                column: ColumnRef::new("claims", "paid"),
                op: Operator::Gt,
                value: FilterValue::Scalar(ScalarValue::Integer(1000)),
            },
            Filter {
                column: ColumnRef::new("claims", "status"),
                op: Operator::Eq,
                value: FilterValue::Scalar(text("x' OR '1'='1")),
            },
        ];

        let q = QueryCompiler::new(&reg).compile(&plan).unwrap();
        assert_eq!(
            q.sql,
            "SELECT claims.claim_id FROM core.\"claims\" claims \
             WHERE claims.loss_date BETWEEN :p0a AND :p0b \
             AND claims.peril = ANY(:p1) \
             AND claims.paid > :p2 \
             AND claims.status = :p3 LIMIT 50"
        );
        assert_eq!(q.placeholders(), vec!["p0a", "p0b", "p1", "p2", "p3"]);
        assert_eq!(q.params.len(), 5);
        assert_eq!(q.params["p3"], BoundValue::Scalar(text("x' OR '1'='1")));
        assert!(!q.sql.contains("2024"));
        assert!(!q.sql.contains("hail"));
        assert!(!q.sql.contains("1000"));
        assert!(!q.sql.contains("OR '1'"));

        assert_eq!(q.param_types.get("p0a"), Some(&ColumnType::Date));
        assert_eq!(q.param_types.get("p2"), Some(&ColumnType::Numeric));
        assert_eq!(q.param_types.get("p1"), None);
    }

    #[test]
    fn aggregation_grouping_and_alias_ordering() {
        let reg = registry();
        let mut plan = base_plan("policies");
        plan.select = vec![ColumnRef::new("policies", "product_type")];
        plan.group_by = vec![ColumnRef::new("policies", "product_type")];
        plan.aggregations = vec![
            Aggregation {
                function: AggregateFunction::Count,
                argument: AggregateArg::Star,
                alias: Some("policies".into()),
            },
            Aggregation {
                function: AggregateFunction::Sum,
                argument: AggregateArg::Column(ColumnRef::new("policies", "gross_premium")),
                alias: Some("premium".into()),
            },
        ];
        plan.order_by = vec![OrderSpec {
            target: OrderTarget::Alias("premium".into()),
            direction: Direction::Desc,
        }];
        plan.limit = 10;

        let q = QueryCompiler::new(&reg).compile(&plan).unwrap();
        assert_eq!(
            q.sql,
            "SELECT policies.product_type, COUNT(*) AS policies, \
             SUM(policies.gross_premium) AS premium \
             FROM core.\"policies\" policies \
             GROUP BY policies.product_type \
             ORDER BY premium DESC LIMIT 10"
        );
    }

    #[test]
    fn joins_come_from_the_registry() {
        let reg = registry();
        let mut plan = base_plan("claims");
        plan.select = vec![ColumnRef::new("customers", "city")];
        plan.joins = vec![
            JoinStep {
                edge: "claims->policies".into(),
                entity: "policies".into(),
            },
            JoinStep {
                edge: "policies->customers".into(),
                entity: "customers".into(),
            },
        ];

        let q = QueryCompiler::new(&reg).compile(&plan).unwrap();
        assert_eq!(
            q.sql,
            "SELECT customers.city FROM core.\"claims\" claims \
             JOIN core.\"policies\" policies ON claims.policy_id = policies.policy_id \
             JOIN core.\"customers\" customers ON policies.customer_id = customers.customer_id \
             LIMIT 50"
        );
    }

    #[test]
    fn compiling_twice_is_byte_identical() {
        let reg = registry();
        let compiler = QueryCompiler::new(&reg);
        let mut plan = base_plan("policies");
        plan.filters = vec![Filter {
            column: ColumnRef::new("policies", "channel"),
            op: Operator::In,
            value: FilterValue::List(vec![text("broker"), text("online")]),
        }];
        let a = compiler.compile(&plan).unwrap();
        let b = compiler.compile(&plan).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn hand_built_plans_are_still_checked() {
        let reg = registry();
        let compiler = QueryCompiler::new(&reg);

        let err = compiler.compile(&base_plan("pg_shadow")).unwrap_err();
        assert!(matches!(err, CompileError::UnknownEntity(_)));

        let mut plan = base_plan("claims");
        plan.select = vec![ColumnRef::new("claims", "paid; DROP TABLE claims")];
        assert!(matches!(
            compiler.compile(&plan).unwrap_err(),
            CompileError::UnknownColumn(_)
        ));

        let mut plan = base_plan("claims");
        plan.joins = vec![JoinStep {
            edge: "claims->customers".into(),
            entity: "customers".into(),
        }];
        assert!(compiler.compile(&plan).is_err());

        let mut plan = base_plan("claims");
        plan.limit = 100_000;
        assert!(matches!(
            compiler.compile(&plan).unwrap_err(),
            CompileError::LimitOutOfRange { .. }
        ));

        let mut plan = base_plan("claims");
        plan.aggregations = vec![Aggregation {
            function: AggregateFunction::Count,
            argument: AggregateArg::Star,
            alias: Some("n FROM pg_user --".into()),
        }];
        assert!(matches!(
            compiler.compile(&plan).unwrap_err(),
            CompileError::InvalidAlias(_)
        ));
    }
}
