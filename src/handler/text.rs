use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use nu_ansi_term::{Color, Style};

use super::{Handler, HandlerOptions, Scope};
use crate::error::LogResult;
use crate::record::{Attr, Level, Record, Value};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-oriented sink for terminals:
///
/// ```text
/// 2026-10-17 11:12:03 INF src/main.rs:57 Request name=access method=GET status=200
/// ```
///
/// Group members are flattened with dotted keys (`auth.user=admin`). Values
/// that would be ambiguous unquoted are printed as quoted strings. Colors
/// are off unless enabled with [`TextHandler::with_color`].
pub struct TextHandler<W> {
    writer: Arc<Mutex<W>>,
    options: HandlerOptions,
    color: bool,
    scope: Scope,
}

impl<W: Write + Send + 'static> TextHandler<W> {
    pub fn new(writer: W, options: HandlerOptions) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            options,
            color: false,
            scope: Scope::default(),
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn derive(&self, scope: Scope) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            options: self.options,
            color: self.color,
            scope,
        }
    }

    fn paint(&self, buf: &mut String, style: Style, text: &str) {
        if self.color {
            let _ = write!(buf, "{}", style.paint(text));
        } else {
            buf.push_str(text);
        }
    }

    fn format(&self, record: &Record) -> String {
        let mut buf = String::with_capacity(128);

        let time = record.time.with_timezone(&Local).format(TIME_FORMAT);
        self.paint(&mut buf, faint(), &time.to_string());
        buf.push(' ');

        self.paint(&mut buf, level_style(record.level), record.level.short());

        if self.options.add_source
            && let Some(source) = &record.source
        {
            buf.push(' ');
            self.paint(&mut buf, faint(), &source.to_string());
        }

        buf.push(' ');
        buf.push_str(&record.message);

        let attrs = self.scope.resolve(&record.attrs);
        self.append_attrs(&mut buf, "", &attrs);
        buf.push('\n');
        buf
    }

    fn append_attrs(&self, buf: &mut String, prefix: &str, attrs: &[Attr]) {
        for attr in attrs {
            let key = if prefix.is_empty() {
                attr.key.clone()
            } else {
                format!("{prefix}.{}", attr.key)
            };

            match &attr.value {
                Value::Group(children) => self.append_attrs(buf, &key, children),
                value => {
                    buf.push(' ');
                    self.paint(buf, faint(), &format!("{key}="));
                    let rendered = quote_if_needed(&value.to_string());
                    if attr.key == "error" {
                        self.paint(buf, Color::LightRed.normal(), &rendered);
                    } else {
                        buf.push_str(&rendered);
                    }
                }
            }
        }
    }
}

impl<W: Write + Send + 'static> Handler for TextHandler<W> {
    fn enabled(&self, level: Level) -> bool {
        level >= self.options.level
    }

    fn handle(&self, record: &Record) -> LogResult<()> {
        let line = self.format(record);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
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

fn faint() -> Style {
    Style::new().dimmed()
}

fn level_style(level: Level) -> Style {
    match level {
        Level::Debug => faint(),
        Level::Info => Color::LightGreen.normal(),
        Level::Warn => Color::LightYellow.normal(),
        Level::Error => Color::LightRed.normal(),
    }
}

fn quote_if_needed(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '=');
    if needs_quotes {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}
