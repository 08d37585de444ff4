//! Record sinks.
//!
//! A [`Handler`] decides whether a level is enabled and turns a [`Record`]
//! into output. Handlers are immutable once built: [`Handler::with_attrs`]
//! and [`Handler::with_group`] return new handlers that share the underlying
//! writer but carry extra pre-bound context.
//!
//! # Built-in sinks
//!
//! | Sink | Output |
//! |------|--------|
//! | [`JsonHandler`] | one JSON object per line |
//! | [`TextHandler`] | `2026-01-02 15:04:05 INF msg key=value` |
//! | [`DiscardHandler`] | nothing, every level disabled |
//! | [`CaptureHandler`] | records kept in memory (tests) |

mod capture;
mod discard;
mod json;
mod text;

use std::sync::Arc;

pub use capture::CaptureHandler;
pub use discard::DiscardHandler;
pub use json::JsonHandler;
pub use text::TextHandler;

use crate::error::LogResult;
use crate::record::{Attr, Level, Record, Value};

/// Sink contract consumed by [`Logger`](crate::Logger).
pub trait Handler: Send + Sync {
    /// Whether records at `level` should be built at all.
    fn enabled(&self, level: Level) -> bool;

    /// Write one record.
    fn handle(&self, record: &Record) -> LogResult<()>;

    /// A handler whose output always includes `attrs`.
    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler>;

    /// A handler that nests all subsequent attributes under `name`.
    fn with_group(&self, name: &str) -> Arc<dyn Handler>;
}

/// Options shared by the built-in encoding sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Minimum enabled level.
    pub level: Level,
    /// Include the `file:line` of the logging call.
    pub add_source: bool,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            level: Level::Info,
            add_source: false,
        }
    }
}

/// Attributes and open groups bound through `with_attrs` / `with_group`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    attrs: Vec<Attr>,
    groups: Vec<String>,
}

impl Scope {
    pub(crate) fn with_attrs(&self, attrs: Vec<Attr>) -> Self {
        let mut scope = self.clone();
        insert_at(&mut scope.attrs, &scope.groups, attrs);
        scope
    }

    pub(crate) fn with_group(&self, name: &str) -> Self {
        let mut scope = self.clone();
        if !name.is_empty() {
            scope.groups.push(name.to_string());
        }
        scope
    }

    /// Bound attributes followed by the record's own, placed in the
    /// innermost open group.
    pub(crate) fn resolve(&self, record_attrs: &[Attr]) -> Vec<Attr> {
        let mut out = self.attrs.clone();
        insert_at(&mut out, &self.groups, record_attrs.to_vec());
        out
    }
}

fn insert_at(tree: &mut Vec<Attr>, path: &[String], attrs: Vec<Attr>) {
    let Some((head, rest)) = path.split_first() else {
        tree.extend(attrs);
        return;
    };

    let existing = tree
        .iter()
        .rposition(|a| a.key == *head && matches!(a.value, Value::Group(_)));
    let idx = match existing {
        Some(idx) => idx,
        None => {
            tree.push(Attr::group(head.clone(), Vec::new()));
            tree.len() - 1
        }
    };

    if let Some(Attr {
        value: Value::Group(children),
        ..
    }) = tree.get_mut(idx)
    {
        insert_at(children, rest, attrs);
    }
}
