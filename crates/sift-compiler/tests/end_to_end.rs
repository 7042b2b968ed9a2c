//! Raw Plan through validation and compilation.

use pretty_assertions::assert_eq;
use serde_json::json;
use sift_compiler::{QueryCompiler, ToPositional};
use sift_core::{BoundValue, RawPlan, ScalarValue, SchemaRegistry};
use sift_policy::PlanValidator;

fn compile(plan: serde_json::Value) -> sift_core::CompiledQuery {
    let registry = SchemaRegistry::builtin().unwrap();
    let raw: RawPlan = serde_json::from_value(plan).unwrap();
    let normalized = PlanValidator::new(&registry).validate(&raw).unwrap();
    QueryCompiler::new(&registry).compile(&normalized).unwrap()
}

#[test]
fn active_policies_for_cluj_customers() {
    let q = compile(json!({
        "view": "policies",
        "select": ["policy_id", "product_type", "customers.city"],
        "joins": ["policies->customers"],
        "filters": [
            {"col": "customers.city", "op": "ILIKE", "val": "Cluj%"},
            {"col": "policies.status", "op": "=", "val": "active"}
        ],
        "order_by": [{"col": "policies.product_type", "dir": "asc"}],
        "limit": 25
    }));

    assert_eq!(
        q.sql,
        "SELECT policies.policy_id, policies.product_type, customers.city \
         FROM core.\"policies\" policies \
         JOIN core.\"customers\" customers ON policies.customer_id = customers.customer_id \
         WHERE customers.city ILIKE :p0 AND policies.status = :p1 \
         ORDER BY policies.product_type ASC LIMIT 25"
    );
    assert_eq!(q.placeholders(), vec!["p0", "p1"]);
    assert_eq!(q.params["p0"], BoundValue::Scalar(ScalarValue::Text("Cluj%".into())));
    assert_eq!(q.params["p1"], BoundValue::Scalar(ScalarValue::Text("active".into())));
    assert!(!q.sql.contains(":p2"));
}

#[test]
fn placeholder_count_matches_value_slots() {
    let q = compile(json!({
        "view": "claims",
        "joins": ["claims->policies"],
        "filters": [
            {"col": "loss_date", "op": "BETWEEN", "val": ["2024-01-01", "2024-06-30"]},
            {"col": "peril", "op": "IN", "val": ["hail", "flood", "wind"]},
            {"col": "policies.channel", "op": "<>", "val": "broker"}
        ],
        "aggregations": ["sum(claims.paid) as total_paid"],
        "limit": "500"
    }));

    // 2 for the range, 1 for the list, 1 for the scalar.
    assert_eq!(q.placeholders().len(), 4);
    assert_eq!(q.params.len(), 4);
    assert!(q.sql.ends_with("LIMIT 200"));
    for literal in ["2024", "hail", "flood", "broker"] {
        assert!(!q.sql.contains(literal), "{} leaked into query text", literal);
    }

    let positional = q.to_positional().unwrap();
    assert_eq!(
        positional.sql,
        "SELECT SUM(claims.paid) AS total_paid FROM core.\"claims\" claims \
         JOIN core.\"policies\" policies ON claims.policy_id = policies.policy_id \
         WHERE claims.loss_date BETWEEN $1::date AND $2::date \
         AND claims.peril = ANY($3) AND policies.channel <> $4 LIMIT 200"
    );
}

#[test]
fn hoisted_aggregations_compile_with_grouping() {
    let q = compile(json!({
        "view": "policies",
        "select": ["channel", "count(*) as policies", "AVG(discount_pct) as avg_discount"],
        "group_by": ["channel"],
        "order_by": [{"col": "policies", "dir": "desc"}]
    }));
    assert_eq!(
        q.sql,
        "SELECT policies.channel, COUNT(*) AS policies, AVG(policies.discount_pct) AS avg_discount \
         FROM core.\"policies\" policies GROUP BY policies.channel \
         ORDER BY policies DESC LIMIT 50"
    );
}
