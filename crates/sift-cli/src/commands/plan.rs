//! `sift validate` and `sift compile`.
//!
//! Plans are read from a file (or `-` for stdin), checked against the
//! embedded Plan JSON Schema, then run through the validator.

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use sift_compiler::{QueryCompiler, ToPositional};
use sift_core::{RawPlan, SchemaRegistry};
use sift_policy::PlanValidator;
use std::io::Read;
use std::path::Path;

/// Compiled into the binary so checks work outside the repository.
const PLAN_SCHEMA: &str = include_str!("../../../../schemas/Plan.schema.json");

/// Read a raw Plan, rejecting documents that don't match the Plan schema.
pub fn read_plan(path: &Path) -> Result<RawPlan> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read plan from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan file {}", path.display()))?
    };

    let value: JsonValue = serde_json::from_str(&content).context("Plan is not valid JSON")?;

    let errors = schema_errors(&value)?;
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  - {}", e);
        }
        anyhow::bail!("Plan does not match Plan.schema.json ({} error(s))", errors.len());
    }

    serde_json::from_value(value).context("Plan could not be decoded")
}

fn schema_errors(plan: &JsonValue) -> Result<Vec<String>> {
    let schema: JsonValue = serde_json::from_str(PLAN_SCHEMA)?;
    let validator = jsonschema::draft202012::options()
        .build(&schema)
        .map_err(|e| anyhow::anyhow!("Invalid embedded Plan schema: {}", e))?;
    Ok(validator.iter_errors(plan).map(|e| e.to_string()).collect())
}

/// Print the normalized Plan, or the validation error as JSON.
pub fn validate(registry: &SchemaRegistry, file: &Path) -> Result<()> {
    let raw = read_plan(file)?;
    match PlanValidator::new(registry).validate(&raw) {
        Ok(plan) => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e)?);
            anyhow::bail!("Plan rejected: {}", e)
        }
    }
}

/// Print the compiled query. `positional` prints `$n` text and an ordered
/// parameter array instead of named placeholders.
pub fn compile(registry: &SchemaRegistry, file: &Path, positional: bool) -> Result<()> {
    let raw = read_plan(file)?;
    let out = compile_plan(registry, &raw, positional)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn compile_plan(registry: &SchemaRegistry, raw: &RawPlan, positional: bool) -> Result<JsonValue> {
    let plan = PlanValidator::new(registry)
        .validate(raw)
        .map_err(|e| anyhow::anyhow!("Plan rejected: {}", e))?;
    let compiled = QueryCompiler::new(registry).compile(&plan)?;

    Ok(if positional {
        let q = compiled.to_positional()?;
        serde_json::json!({
            "sql": q.sql,
            "params": q.params,
            "contains_sensitive": plan.contains_sensitive,
        })
    } else {
        serde_json::json!({
            "sql": compiled.sql,
            "params": compiled.params,
            "contains_sensitive": plan.contains_sensitive,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_plan(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    #[test]
    fn reads_a_well_formed_plan() {
        let f = write_plan(r#"{"view": "claims", "select": ["claims.status"], "limit": 10}"#);
        let raw = read_plan(f.path()).unwrap();
        assert_eq!(raw.view, "claims");
        assert_eq!(raw.select, vec!["claims.status".to_string()]);
    }

    #[test]
    fn rejects_plans_outside_the_schema() {
        let f = write_plan(r#"{"select": ["claims.status"]}"#);
        assert!(read_plan(f.path()).is_err());

        let f = write_plan("not json");
        assert!(read_plan(f.path()).is_err());
    }

    #[test]
    fn validate_and_compile_builtin_registry() {
        let registry = SchemaRegistry::builtin().unwrap();
        let f = write_plan(
            r#"{"view": "policies", "select": ["status", "count(*) as n"], "group_by": ["status"]}"#,
        );
        validate(&registry, f.path()).unwrap();
        compile(&registry, f.path(), true).unwrap();

        let bad = write_plan(r#"{"view": "policies", "select": ["nope"]}"#);
        assert!(validate(&registry, bad.path()).is_err());
    }

    #[test]
    fn malformed_limits_reach_the_clamp() {
        let registry = SchemaRegistry::builtin().unwrap();
        let sql = |limit: &str| {
            let f = write_plan(&format!(r#"{{"view": "claims", "limit": {}}}"#, limit));
            let raw = read_plan(f.path()).unwrap();
            let out = compile_plan(&registry, &raw, false).unwrap();
            out["sql"].as_str().unwrap().to_string()
        };
        assert!(sql("12.5").ends_with("LIMIT 12"));
        assert!(sql("true").ends_with("LIMIT 50"));
        assert!(sql("[10]").ends_with("LIMIT 50"));
        assert!(sql(r#"{"n": 10}"#).ends_with("LIMIT 50"));
    }

    #[test]
    fn sort_direction_is_left_to_the_validator() {
        let registry = SchemaRegistry::builtin().unwrap();
        let f = write_plan(r#"{"view": "claims", "order_by": [{"col": "paid", "dir": "Descending"}]}"#);
        let out = compile_plan(&registry, &read_plan(f.path()).unwrap(), false).unwrap();
        assert!(out["sql"].as_str().unwrap().contains("ORDER BY claims.paid DESC"));

        let f = write_plan(r#"{"view": "claims", "order_by": [{"col": "paid", "dir": "sideways"}]}"#);
        let raw = read_plan(f.path()).unwrap();
        let err = compile_plan(&registry, &raw, false).unwrap_err();
        assert!(err.to_string().contains("Plan rejected"));
    }
}
