use std::sync::Arc;

use super::Handler;
use crate::error::LogResult;
use crate::record::{Attr, Level, Record};

/// Sink that drops everything. Every level reports disabled, so loggers
/// built on it skip record construction entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardHandler;

impl DiscardHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for DiscardHandler {
    fn enabled(&self, _level: Level) -> bool {
        false
    }

    fn handle(&self, _record: &Record) -> LogResult<()> {
        Ok(())
    }

    fn with_attrs(&self, _attrs: Vec<Attr>) -> Arc<dyn Handler> {
        Arc::new(*self)
    }

    fn with_group(&self, _name: &str) -> Arc<dyn Handler> {
        Arc::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discard_disables_all_levels() {
        let handler = DiscardHandler::new();
        for level in [Level::Debug, Level::Info, Level::Warn, Level::Error] {
            assert!(!handler.enabled(level));
        }
        assert!(handler.handle(&Record::new(Level::Error, "dropped")).is_ok());
    }
}
