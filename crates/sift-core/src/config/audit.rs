//! Audit logging configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Whether to print events to stdout.
    #[serde(default = "default_stdout")]
    pub stdout: bool,

    /// Directory for daily JSONL audit files. No file output when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Whether to record bound parameter values (may contain sensitive data).
    #[serde(default)]
    pub log_params: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            stdout: default_stdout(),
            directory: None,
            log_params: false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_stdout() -> bool {
    true
}
