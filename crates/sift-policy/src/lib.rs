//! Sift Plan validation.
//!
//! Plans arrive from the natural-language planner as untrusted JSON. This
//! crate checks them against the [`SchemaRegistry`](sift_core::SchemaRegistry)
//! and produces a [`NormalizedPlan`](sift_core::NormalizedPlan) in which every
//! column is qualified, every operator, join and aggregation is allowlisted,
//! and sensitivity is known. Rejections are structured [`ValidationError`]s.
//!
//! ```ignore
//! let registry = SchemaRegistry::builtin()?;
//! let plan = PlanValidator::new(&registry).validate(&raw)?;
//! ```

pub mod aggregation;
pub mod columns;
pub mod error;
pub mod filters;
pub mod joins;
pub mod limit;
pub mod validator;

pub use error::{ErrorCategory, ValidationError, ValidationErrorKind};
pub use joins::JoinScope;
pub use limit::clamp_limit;
pub use validator::PlanValidator;
