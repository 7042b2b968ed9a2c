//! `sift schema` subcommands.

use anyhow::Result;
use sift_core::{SchemaRegistry, SiftConfig};

pub fn list(registry: &SchemaRegistry) -> Result<()> {
    println!("Schema registry v{}", registry.version());
    println!();
    for entity in registry.entities() {
        let sensitive = if entity.sensitive.is_empty() {
            String::new()
        } else {
            format!("  (sensitive: {})", entity.sensitive.iter().cloned().collect::<Vec<_>>().join(", "))
        };
        println!(
            "  {}.{:<36} {:>3} columns{}",
            entity.schema,
            entity.name,
            entity.columns.len(),
            sensitive
        );
    }
    println!();
    println!("Joins:");
    for join in registry.joins() {
        println!("  {:<28} ON {}", join.shorthand(), join.on_clause());
    }
    let (default_limit, max_limit) = registry.limits();
    println!();
    println!("Limits: default {}, max {}", default_limit, max_limit);
    Ok(())
}

pub fn describe(registry: &SchemaRegistry, name: &str) -> Result<()> {
    let entity = registry
        .entity(name)
        .ok_or_else(|| anyhow::anyhow!("Unknown entity '{}'. Run `sift schema list`.", name))?;

    println!("{}.{}", entity.schema, entity.name);
    if let Some(description) = &entity.description {
        println!("  {}", description);
    }
    println!();
    for column in &entity.columns {
        let flag = if entity.sensitive.contains(&column.name) {
            "  [sensitive]"
        } else {
            ""
        };
        println!("  {:<24} {:?}{}", column.name, column.column_type, flag);
    }

    let joins: Vec<_> = registry
        .joins()
        .iter()
        .filter(|j| j.from.entity == entity.name || j.to.entity == entity.name)
        .collect();
    if !joins.is_empty() {
        println!();
        println!("Joins:");
        for join in joins {
            println!("  {}", join.shorthand());
        }
    }
    Ok(())
}

/// Compare the registry with the configured database.
pub async fn check(config: &SiftConfig, registry: &SchemaRegistry) -> Result<()> {
    let url = config.upstream.connection_string();
    let executor = sift_adapter_pg::PostgresExecutor::connect(&url, &config.upstream.pool).await?;
    let drift = sift_adapter_pg::check_registry(executor.pool(), registry).await?;

    if drift.is_empty() {
        println!("Registry matches the database ({} entities).", registry.entities().len());
        return Ok(());
    }
    for d in &drift {
        eprintln!("  - {}", d);
    }
    anyhow::bail!("Registry differs from the database in {} place(s)", drift.len())
}
