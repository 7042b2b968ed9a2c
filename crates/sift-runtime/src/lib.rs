//! # sift-runtime
//!
//! The request pipeline around the core crates:
//!
//! raw Plan → [`PlanValidator`](sift_policy::PlanValidator) →
//! [`QueryCompiler`](sift_compiler::QueryCompiler) → [`QueryExecutor`] →
//! [`Redactor`] → [`Answer`] with [`Citation`]s.
//!
//! Execution and audit storage sit behind traits so the pipeline can run
//! against Postgres (`sift-adapter-pg`) or an in-memory fake in tests.

pub mod audit;
pub mod citations;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod redactor;

pub use audit::AuditSink;
pub use citations::{Citation, CitationType, make_citations};
pub use error::RuntimeError;
pub use executor::{QueryExecutor, Row};
pub use orchestrator::{Answer, AnswerMeta, AskOptions, Orchestrator, question_hash};
pub use redactor::{REDACTION_MARKER, Redactor};
