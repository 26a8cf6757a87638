use std::sync::{Arc, Mutex, PoisonError};

use crate::context::Environment;
use crate::{LogLevel, LogRecord, Logger};

/// An owned copy of a [`LogRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub level: LogLevel,
    pub datasource: String,
    pub request_id: Option<String>,
    pub environment: Environment,
    pub message: String,
}

/// [`Logger`] that keeps every record in memory.
///
/// Clones share the same buffer, so a clone can be handed to a context while
/// the original is kept for assertions.
#[derive(Debug, Clone, Default)]
pub struct CapturingLogger {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
}

impl CapturingLogger {
    /// Creates an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the captured records in emission order.
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of captured records with the given level.
    pub fn count(&self, level: LogLevel) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|record| record.level == level)
            .count()
    }

    /// Discards every captured record.
    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Logger for CapturingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        let captured = CapturedRecord {
            level: record.level,
            datasource: record.datasource.to_owned(),
            request_id: record.request_id.map(str::to_owned),
            environment: record.environment,
            message: record.message.to_owned(),
        };

        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(captured);
    }
}
