//! CLI command implementations for Sift.

pub mod plan;
pub mod run;
pub mod schema;
