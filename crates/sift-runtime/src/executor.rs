use async_trait::async_trait;
use sift_core::CompiledQuery;

/// One result row: output name to value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Downstream execution collaborator.
///
/// Implementations must bind `query.params` out-of-band (never splice them
/// into the text) and return rows as field/value maps.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &CompiledQuery) -> anyhow::Result<Vec<Row>>;
}
