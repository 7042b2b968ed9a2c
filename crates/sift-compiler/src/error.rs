//! Error types for the compiler crate.
//!
//! A normalized Plan has already passed validation, so every variant here is
//! an internal fault rather than a user error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown entity in normalized plan: {0}")]
    UnknownEntity(String),

    #[error("join {0} is not declared in the registry")]
    UnknownJoin(String),

    #[error("column {0} is not declared in the registry")]
    UnknownColumn(String),

    #[error("alias {0} is not a plain identifier")]
    InvalidAlias(String),

    #[error("limit {limit} is outside [1, {max}]")]
    LimitOutOfRange { limit: u32, max: u32 },

    /// A placeholder in the query text has no bound value.
    #[error("placeholder :{0} has no bound value")]
    UnboundPlaceholder(String),

    /// SQL parsing failed while re-checking compiled text.
    #[error("failed to parse compiled SQL: {0}")]
    ParseError(String),

    /// Compiled text is not a single SELECT over registry entities.
    #[error("statement guard rejected compiled SQL: {0}")]
    Guard(String),
}
