use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::SecondsFormat;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use super::{Handler, HandlerOptions, Scope};
use crate::error::LogResult;
use crate::record::{Attr, Level, Record};

/// Sink writing one JSON object per record:
///
/// ```text
/// {"time":"2026-10-17T09:12:03.120384000Z","level":"INFO","msg":"Request","name":"access","status":200}
/// ```
///
/// `source` (`{"file":..,"line":..}`) is emitted between `level` and `msg`
/// when [`HandlerOptions::add_source`] is set and the record carries one.
pub struct JsonHandler<W> {
    writer: Arc<Mutex<W>>,
    options: HandlerOptions,
    scope: Scope,
}

impl<W: Write + Send + 'static> JsonHandler<W> {
    pub fn new(writer: W, options: HandlerOptions) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            options,
            scope: Scope::default(),
        }
    }

    fn derive(&self, scope: Scope) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            options: self.options,
            scope,
        }
    }
}

impl<W: Write + Send + 'static> Handler for JsonHandler<W> {
    fn enabled(&self, level: Level) -> bool {
        level >= self.options.level
    }

    fn handle(&self, record: &Record) -> LogResult<()> {
        let attrs = self.scope.resolve(&record.attrs);
        let mut line = serde_json::to_vec(&JsonRecord {
            record,
            attrs: &attrs,
            add_source: self.options.add_source,
        })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }

    fn with_attrs(&self, attrs: Vec<Attr>) -> Arc<dyn Handler> {
        Arc::new(self.derive(self.scope.with_attrs(attrs)))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        Arc::new(self.derive(self.scope.with_group(name)))
    }
}

struct JsonRecord<'a> {
    record: &'a Record,
    attrs: &'a [Attr],
    add_source: bool,
}

impl Serialize for JsonRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(
            "time",
            &self.record.time.to_rfc3339_opts(SecondsFormat::Nanos, true),
        )?;
        map.serialize_entry("level", &self.record.level)?;
        if self.add_source
            && let Some(source) = &self.record.source
        {
            map.serialize_entry("source", source)?;
        }
        map.serialize_entry("msg", &self.record.message)?;
        for attr in self.attrs.iter().filter(|a| !a.value.is_empty_group()) {
            map.serialize_entry(&attr.key, &attr.value)?;
        }
        map.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::record::Source;

    /// Writer that exposes what was written through a shared buffer.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    #[test]
    fn test_json_record_shape() {
        let buf = SharedBuf::default();
        let handler = JsonHandler::new(buf.clone(), HandlerOptions::default());

        let record = Record::new(Level::Warn, "Request")
            .with_attrs(vec![Attr::int("status", 405), Attr::string("query", "/")]);
        handler.handle(&record).unwrap();

        let lines = buf.lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["msg"], "Request");
        assert_eq!(line["status"], 405);
        assert_eq!(line["query"], "/");
        assert!(line["time"].is_string());
        assert!(line.get("source").is_none());
    }

    #[test]
    fn test_json_source_only_when_enabled() {
        let buf = SharedBuf::default();
        let handler = JsonHandler::new(
            buf.clone(),
            HandlerOptions {
                level: Level::Debug,
                add_source: true,
            },
        );

        let record = Record::new(Level::Info, "with source").with_source(Source {
            file: "src/main.rs",
            line: 42,
        });
        handler.handle(&record).unwrap();

        let line = &buf.lines()[0];
        assert_eq!(line["source"]["file"], "src/main.rs");
        assert_eq!(line["source"]["line"], 42);
    }

    #[test]
    fn test_json_level_threshold() {
        let handler = JsonHandler::new(
            SharedBuf::default(),
            HandlerOptions {
                level: Level::Warn,
                add_source: false,
            },
        );

        assert!(!handler.enabled(Level::Info));
        assert!(handler.enabled(Level::Warn));
        assert!(handler.enabled(Level::Error));
    }

    #[test]
    fn test_json_with_attrs_and_group() {
        let buf = SharedBuf::default();
        let handler = JsonHandler::new(buf.clone(), HandlerOptions::default());
        let derived = handler
            .with_attrs(vec![Attr::string("name", "memory_stat")])
            .with_group("mem");

        derived
            .handle(&Record::new(Level::Info, "runtime MemStats").with_attrs(vec![Attr::int(
                "num_gc", 3,
            )]))
            .unwrap();

        let line = &buf.lines()[0];
        assert_eq!(line["name"], "memory_stat");
        assert_eq!(line["mem"]["num_gc"], 3);
    }
}
