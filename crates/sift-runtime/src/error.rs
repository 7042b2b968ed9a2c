use sift_compiler::CompileError;
use sift_policy::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The Plan was rejected. Safe to show to the caller.
    #[error("invalid plan: {0}")]
    Validation(#[from] ValidationError),

    /// A validated Plan failed to compile. Indicates a bug, not bad input.
    #[error("internal compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("query execution failed: {0}")]
    Execution(#[source] anyhow::Error),
}

impl RuntimeError {
    /// Whether the caller caused this error (as opposed to the system).
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
