//! # sift-compiler
//!
//! Renders a validated [`NormalizedPlan`](sift_core::NormalizedPlan) into
//! parameterized SQL.
//!
//! ```sql
//! SELECT policies.product_type FROM core."policies" policies
//! JOIN core."customers" customers ON policies.customer_id = customers.customer_id
//! WHERE customers.city ILIKE :p0 AND policies.status = :p1
//! ORDER BY policies.product_type ASC LIMIT 25
//! ```
//!
//! | Filter shape | Rendered predicate |
//! |--------------|--------------------|
//! | scalar       | `col {op} :pN`     |
//! | range        | `col BETWEEN :pNa AND :pNb` |
//! | list         | `col = ANY(:pN)`   |
//!
//! Output is re-parsed by [`StatementGuard`] before it is returned, and can be
//! rewritten to `$n` placeholders with [`ToPositional`] for the wire protocol.

pub mod compiler;
pub mod error;
pub mod guard;
pub mod positional;

pub use compiler::QueryCompiler;
pub use error::CompileError;
pub use guard::StatementGuard;
pub use positional::{PositionalQuery, ToPositional};
