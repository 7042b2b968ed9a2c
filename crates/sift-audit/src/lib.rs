//! # sift-audit
//!
//! Audit logging for Sift.
//!
//! Every question answered through Sift leaves a trail: whether its Plan was
//! validated or rejected (and why), the SQL it compiled to, and how execution
//! went. Events never contain the question text itself, only a truncated hash.
//!
//! - **File output**: JSON Lines, one file per UTC day (`audit-YYYY-MM-DD.jsonl`)
//! - **Console output**: Human-readable log lines
//!
//! ## Event Types
//!
//! | Event Type | Description |
//! |------------|-------------|
//! | `PlanValidated` | Plan passed validation |
//! | `PlanRejected` | Plan was rejected, with the error kind |
//! | `QueryCompiled` | SQL was produced (params only if `log_params`) |
//! | `QueryExecuted` | Query ran, with row count and latency |
//! | `QueryFailed` | Compilation or execution failed |
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sift_audit::{AuditContext, AuditLogger};
//! use sift_core::AuditConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = AuditLogger::new(AuditConfig::default())?;
//! let ctx = AuditContext { user_id: Some("analyst-7".into()), ..Default::default() };
//!
//! logger
//!     .log_plan_rejected(&ctx, "claims", "ambiguous_column", "Ambiguous column \"status\"")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use logger::{AuditContext, AuditFilter, AuditLogger};
pub use storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};
