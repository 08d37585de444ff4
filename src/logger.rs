//! The [`Logger`] handle, its builder, and the process-wide default slot.
//!
//! # Construction
//!
//! ```rust,no_run
//! use slogx::{LoggerBuilder, OutputFormat};
//!
//! let logger = LoggerBuilder::new()
//!     .level("debug")
//!     .output_format(OutputFormat::Text)
//!     .log_file("/var/log/app.log")
//!     .build();
//!
//! logger.info("service started", vec![]);
//! ```
//!
//! # Default logger
//!
//! The default slot starts out as a discard logger. `LoggerBuilder` replaces
//! it on `build` unless `set_default(false)` is given. Readers always observe
//! the most recent store; replacement is meant for startup, not hot paths.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::panic::Location;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;
use tracing::{error, warn};

use crate::error::{LogError, LogResult};
use crate::format::OutputFormat;
use crate::handler::{DiscardHandler, Handler, HandlerOptions, JsonHandler, TextHandler};
use crate::record::{Attr, Level, Record};

/// Attribute key carrying a component or middleware name.
pub const NAME_KEY: &str = "name";

static DEFAULT_LOGGER: LazyLock<ArcSwap<Logger>> =
    LazyLock::new(|| ArcSwap::from_pointee(Logger::discard()));

/// Replace the process-wide default logger.
pub fn set_default(logger: Logger) {
    DEFAULT_LOGGER.store(Arc::new(logger));
}

/// The current process-wide default logger.
pub fn default_logger() -> Logger {
    DEFAULT_LOGGER.load_full().as_ref().clone()
}

// =============================================================================
// Logger
// =============================================================================

/// Cheap-to-clone handle around a shared [`Handler`].
///
/// Logging never fails from the caller's point of view: sink errors are
/// reported through `tracing` and otherwise dropped.
#[derive(Clone)]
pub struct Logger {
    handler: Arc<dyn Handler>,
}

impl Logger {
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn from_handler(handler: Arc<dyn Handler>) -> Self {
        Self { handler }
    }

    /// Logger whose every level is disabled.
    pub fn discard() -> Self {
        Self::new(DiscardHandler::new())
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.handler.enabled(level)
    }

    /// Emit one record. The caller's location is recorded as the source.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>, attrs: Vec<Attr>) {
        if !self.handler.enabled(level) {
            return;
        }

        let record = Record::new(level, message)
            .with_attrs(attrs)
            .with_source(Location::caller().into());

        if let Err(e) = self.handler.handle(&record) {
            warn!(error = %e, level = %level, "Log sink rejected record");
        }
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>, attrs: Vec<Attr>) {
        self.log(Level::Debug, message, attrs);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>, attrs: Vec<Attr>) {
        self.log(Level::Info, message, attrs);
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>, attrs: Vec<Attr>) {
        self.log(Level::Warn, message, attrs);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>, attrs: Vec<Attr>) {
        self.log(Level::Error, message, attrs);
    }

    /// A logger whose records always carry `attrs`.
    pub fn with(&self, attrs: Vec<Attr>) -> Logger {
        if attrs.is_empty() {
            return self.clone();
        }
        Self::from_handler(self.handler.with_attrs(attrs))
    }

    /// A logger that nests subsequent attributes under `name`.
    pub fn with_group(&self, name: &str) -> Logger {
        Self::from_handler(self.handler.with_group(name))
    }

    /// Shorthand for `with(vec![Attr::string("name", name)])`.
    pub fn named(&self, name: &str) -> Logger {
        self.with(vec![Attr::string(NAME_KEY, name)])
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::discard()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Where an encoding sink writes.
enum LogOutput {
    Stdout(io::Stdout),
    File(File),
}

impl Write for LogOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogOutput::Stdout(out) => out.write(buf),
            LogOutput::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogOutput::Stdout(out) => out.flush(),
            LogOutput::File(file) => file.flush(),
        }
    }
}

/// Construction options for a [`Logger`].
///
/// | Option | Default |
/// |--------|---------|
/// | level | `Info` (unknown strings fall back to `Info`) |
/// | add_source | `true` |
/// | output_format | `Json` |
/// | set_default | `true` |
/// | log_file | standard output |
/// | custom_handler | none |
pub struct LoggerBuilder {
    level: Level,
    add_source: bool,
    output_format: OutputFormat,
    set_default: bool,
    log_file: String,
    custom_handler: Option<Arc<dyn Handler>>,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            level: Level::Info,
            add_source: true,
            output_format: OutputFormat::Json,
            set_default: true,
            log_file: String::new(),
            custom_handler: None,
        }
    }
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum level from its name. Unknown names select `Info`.
    pub fn level(mut self, level: &str) -> Self {
        self.level = level.parse().unwrap_or(Level::Info);
        self
    }

    pub fn min_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn add_source(mut self, add_source: bool) -> Self {
        self.add_source = add_source;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Output format from its name. Unknown names select `Json`.
    pub fn format(self, name: &str) -> Self {
        self.output_format(OutputFormat::from_name(name))
    }

    pub fn set_default(mut self, set_default: bool) -> Self {
        self.set_default = set_default;
        self
    }

    /// Output path. `""`, `"stdout"` and `"/dev/stdout"` mean standard output.
    pub fn log_file(mut self, path: impl Into<String>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Use `handler` as-is; level, format and file options are ignored.
    pub fn custom_handler(mut self, handler: impl Handler + 'static) -> Self {
        self.custom_handler = Some(Arc::new(handler));
        self
    }

    /// Build the logger, reporting an unopenable output file as an error.
    pub fn try_build(self) -> LogResult<Logger> {
        let logger = match &self.custom_handler {
            Some(handler) => Logger::from_handler(Arc::clone(handler)),
            None => {
                let options = HandlerOptions {
                    level: self.level,
                    add_source: self.add_source,
                };
                let (output, is_terminal) = open_output(&self.log_file)?;
                match self.output_format {
                    OutputFormat::Json => Logger::new(JsonHandler::new(output, options)),
                    OutputFormat::Text => {
                        Logger::new(TextHandler::new(output, options).with_color(is_terminal))
                    }
                }
            }
        };

        if self.set_default {
            set_default(logger.clone());
        }

        Ok(logger)
    }

    /// Build the logger, terminating the process if the output file cannot
    /// be opened. A logger that cannot write is a startup misconfiguration.
    pub fn build(self) -> Logger {
        match self.try_build() {
            Ok(logger) => logger,
            Err(e) => {
                error!("{e}");
                eprintln!("{e}");
                std::process::exit(exitcode::CANTCREAT);
            }
        }
    }
}

fn open_output(path: &str) -> LogResult<(LogOutput, bool)> {
    match path {
        "" | "stdout" | "/dev/stdout" => {
            let stdout = io::stdout();
            let is_terminal = stdout.is_terminal();
            Ok((LogOutput::Stdout(stdout), is_terminal))
        }
        _ => {
            let mut options = OpenOptions::new();
            options.read(true).append(true).create(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o644);
            }
            let file = options.open(path).map_err(|source| LogError::OpenLogFile {
                path: PathBuf::from(path),
                source,
            })?;
            Ok((LogOutput::File(file), false))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::handler::CaptureHandler;

    #[test]
    fn test_logger_records_source_location() {
        let capture = CaptureHandler::new();
        let logger = Logger::new(capture.clone());

        logger.info("hello", vec![Attr::int("n", 1)]);

        let records = capture.records();
        assert_eq!(records.len(), 1);
        let source = records[0].source.unwrap();
        assert!(source.file.ends_with("logger.rs"));
        assert_eq!(records[0].level, Level::Info);
    }

    #[test]
    fn test_logger_skips_disabled_levels() {
        let logger = Logger::discard();
        assert!(!logger.enabled(Level::Error));
        logger.error("never built", vec![]);
    }

    #[test]
    fn test_named_logger_adds_name_attr() {
        let capture = CaptureHandler::new();
        let logger = Logger::new(capture.clone()).named("memory_stat");

        logger.warn("tick", vec![]);

        let records = capture.records();
        assert_eq!(
            records[0].attr(NAME_KEY).and_then(|v| v.as_str()),
            Some("memory_stat")
        );
        assert_eq!(records[0].level, Level::Warn);
    }

    #[test]
    fn test_builder_unknown_level_falls_back_to_info() {
        let builder = LoggerBuilder::new().level("chatty");
        assert_eq!(builder.level, Level::Info);

        let builder = LoggerBuilder::new().level("ERROR");
        assert_eq!(builder.level, Level::Error);
    }

    #[test]
    fn test_builder_unknown_format_falls_back_to_json() {
        let builder = LoggerBuilder::new().format("yaml");
        assert_eq!(builder.output_format, OutputFormat::Json);

        let builder = LoggerBuilder::new().format("text");
        assert_eq!(builder.output_format, OutputFormat::Text);
    }

    #[test]
    fn test_builder_custom_handler_wins() {
        let capture = CaptureHandler::new();
        let logger = LoggerBuilder::new()
            .set_default(false)
            .log_file("/nonexistent-dir/never-opened.log")
            .custom_handler(capture.clone())
            .try_build()
            .unwrap();

        logger.debug("debug passes through the custom sink", vec![]);
        assert_eq!(capture.len(), 1);
    }

    #[test]
    fn test_builder_open_failure_is_reported() {
        let err = LoggerBuilder::new()
            .set_default(false)
            .log_file("/nonexistent-dir/app.log")
            .try_build()
            .unwrap_err();

        assert!(matches!(err, LogError::OpenLogFile { .. }));
    }

    #[test]
    fn test_builder_writes_json_to_file() {
        let path = std::env::temp_dir().join(format!("slogx-builder-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let logger = LoggerBuilder::new()
            .set_default(false)
            .add_source(false)
            .log_file(path.to_string_lossy())
            .try_build()
            .unwrap();
        logger.info("to file", vec![Attr::string("k", "v")]);
        logger.debug("filtered", vec![]);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let json: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(json["msg"], "to file");
        assert_eq!(json["k"], "v");
        assert!(json.get("source").is_none());

        let _ = std::fs::remove_file(&path);
    }
}
