//! Audit storage backends.

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::logger::AuditFilter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Trait for audit storage backends.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Store an audit event.
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// Query audit events with filters.
    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError>;

    /// Get an audit event by ID.
    async fn get(&self, event_id: Uuid) -> Result<Option<AuditEvent>, AuditError>;
}

/// Console storage (human-readable lines on stderr, keeping stdout free for
/// command output).
#[derive(Debug, Default)]
pub struct ConsoleStorage;

impl ConsoleStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditStorage for ConsoleStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        eprintln!("{}", event.to_log_line());
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        // Console storage doesn't support querying
        Ok(vec![])
    }

    async fn get(&self, _event_id: Uuid) -> Result<Option<AuditEvent>, AuditError> {
        Ok(None)
    }
}

/// File storage: one JSON Lines file per UTC day, `audit-YYYY-MM-DD.jsonl`.
pub struct FileStorage {
    directory: PathBuf,
    // Serializes appends so concurrent requests never interleave lines.
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create a file storage rooted at `directory`, creating it if missing.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| {
            AuditError::InitializationFailed(format!(
                "cannot create audit directory {}: {}",
                directory.display(),
                e
            ))
        })?;
        Ok(Self {
            directory,
            write_lock: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file holding events that occurred on `at`'s UTC day.
    pub fn file_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.directory
            .join(format!("audit-{}.jsonl", at.format("%Y-%m-%d")))
    }

    /// All daily files, oldest first.
    fn daily_files(&self) -> Result<Vec<PathBuf>, AuditError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let is_audit_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("audit-") && n.ends_with(".jsonl"));
            if is_audit_file {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_all(&self) -> Result<Vec<AuditEvent>, AuditError> {
        let mut events = Vec::new();
        for path in self.daily_files()? {
            let reader = BufReader::new(std::fs::File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AuditEvent>(&line) {
                    Ok(event) => events.push(event),
                    Err(e) => {
                        tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable audit line");
                    }
                }
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl AuditStorage for FileStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        let json = serde_json::to_string(&event)?;
        let path = self.file_for(event.occurred_at);

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| AuditError::StorageError(format!("Failed to acquire write lock: {}", e)))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        let events = self.read_all()?;

        let mut results: Vec<_> = events.into_iter().filter(|e| filter.matches(e)).collect();

        // Apply offset and limit
        if let Some(offset) = filter.offset {
            results = results.into_iter().skip(offset).collect();
        }
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn get(&self, event_id: Uuid) -> Result<Option<AuditEvent>, AuditError> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|e| e.event_id == event_id))
    }
}

/// File storage plus console echo.
pub struct DualStorage {
    file: FileStorage,
    console: ConsoleStorage,
}

impl DualStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, AuditError> {
        Ok(Self {
            file: FileStorage::new(directory)?,
            console: ConsoleStorage::new(),
        })
    }
}

#[async_trait]
impl AuditStorage for DualStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.console.store(event.clone()).await?;
        self.file.store(event).await
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.file.query(filter).await
    }

    async fn get(&self, event_id: Uuid) -> Result<Option<AuditEvent>, AuditError> {
        self.file.get(event_id).await
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullStorage;

impl NullStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditStorage for NullStorage {
    async fn store(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(vec![])
    }

    async fn get(&self, _event_id: Uuid) -> Result<Option<AuditEvent>, AuditError> {
        Ok(None)
    }
}
