//! # sift-core
//!
//! Shared types for Sift: the Plan model handed to us by the natural-language
//! planner, the normalized Plan produced by validation, the compiled query
//! handed to execution, and the [`SchemaRegistry`] allowlist every other
//! crate consults.
//!
//! Nothing in this crate performs I/O at request time. The registry is loaded
//! once at startup (from the bundled YAML or a configured file) and shared
//! read-only afterwards.

// Configuration types shared across all Sift crates
pub mod config;

pub mod plan;
pub mod query;
pub mod schema;
pub mod value;

pub use config::{AuditConfig, ConfigError, LoggingConfig, SiftConfig, UpstreamConfig};
pub use plan::{
    AggregateArg, AggregateFunction, Aggregation, ColumnRef, Direction, Filter, JoinStep,
    NormalizedPlan, Operator, OrderSpec, OrderTarget, RawFilter, RawOrder, RawPlan, ValueShape,
};
pub use query::CompiledQuery;
pub use schema::{
    Column, ColumnType, Entity, JoinEdge, RegistryDefinition, RegistryError, SchemaRegistry,
};
pub use value::{BoundValue, FilterValue, ScalarValue};

/// Returns true if `s` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Every name that ends up verbatim in query text (schemas, entities, columns,
/// aggregation aliases) must pass this check.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
