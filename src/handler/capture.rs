use std::sync::{Arc, Mutex, PoisonError};

use super::{Handler, Scope};
use crate::error::LogResult;
use crate::record::{Attr, Level, Record};

/// Sink that keeps every record in memory.
///
/// Clones (and handlers derived through `with_attrs` / `with_group`) share
/// the same buffer, so a test can hand a logger to the code under test and
/// inspect what it emitted afterwards. Bound attributes are resolved into
/// each stored record.
///
/// ```rust
/// use slogx::{CaptureHandler, Logger};
///
/// let capture = CaptureHandler::new();
/// let logger = Logger::new(capture.clone());
/// logger.info("hello", vec![]);
///
/// assert_eq!(capture.len(), 1);
/// assert_eq!(capture.records()[0].message, "hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CaptureHandler {
    records: Arc<Mutex<Vec<Record>>>,
    scope: Scope,
}

impl CaptureHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records captured so far.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Handler for CaptureHandler {
    fn enabled(&self, _level: Level) -> bool {
        true
    }

    fn handle(&self, record: &Record) -> LogResult<()> {
        let mut stored = record.clone();
        stored.attrs = self.scope.resolve(&record.attrs);
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stored);
        Ok(())
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler> {
        Arc::new(Self {
            records: Arc::clone(&self.records),
            scope: self.scope.with_attrs(attrs),
        })
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        Arc::new(Self {
            records: Arc::clone(&self.records),
            scope: self.scope.with_group(name),
        })
    }
}
