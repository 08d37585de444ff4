//! Structured log record model.
//!
//! A [`Record`] is one log event: a timestamp, a [`Level`], a message and an
//! ordered list of [`Attr`] key-value pairs. Attribute values are typed
//! ([`Value`]) so sinks can encode them faithfully: integers stay integers in
//! JSON, durations become nanoseconds, groups become nested objects.
//!
//! # Example
//!
//! ```rust
//! use slogx::{Attr, Level, Record};
//!
//! let record = Record::new(Level::Info, "user created")
//!     .with_attrs(vec![
//!         Attr::string("email", "user@example.com"),
//!         Attr::int("id", 42),
//!     ]);
//!
//! assert_eq!(record.attr("id").and_then(|v| v.as_i64()), Some(42));
//! ```

use std::fmt;
use std::panic::Location;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::LogError;

// =============================================================================
// Level
// =============================================================================

/// Severity of a record. Ordered: `Debug < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    /// Upper-case name used by the JSON sink.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    /// Three-letter tag used by the text sink.
    pub fn short(self) -> &'static str {
        match self {
            Level::Debug => "DBG",
            Level::Info => "INF",
            Level::Warn => "WRN",
            Level::Error => "ERR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            _ => Err(LogError::UnknownLevel(s.to_string())),
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// =============================================================================
// Value / Attr
// =============================================================================

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    Time(DateTime<Utc>),
    Group(Vec<Attr>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&[Attr]> {
        match self {
            Value::Group(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// A group with no non-empty members. Sinks skip these.
    pub fn is_empty_group(&self) -> bool {
        match self {
            Value::Group(attrs) => attrs.iter().all(|a| a.value.is_empty_group()),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Duration(d) => write!(f, "{d:?}"),
            Value::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Value::Group(attrs) => {
                f.write_str("[")?;
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}={}", attr.key, attr.value)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Uint(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Duration(d) => {
                serializer.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            }
            Value::Time(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
            Value::Group(attrs) => AttrMap(attrs).serialize(serializer),
        }
    }
}

/// Serializes a slice of attributes as a JSON object, preserving order and
/// dropping empty groups.
pub(crate) struct AttrMap<'a>(pub &'a [Attr]);

impl Serialize for AttrMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for attr in self.0.iter().filter(|a| !a.value.is_empty_group()) {
            map.serialize_entry(&attr.key, &attr.value)?;
        }
        map.end()
    }
}

/// A key-value pair attached to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Value::String(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, Value::Int(value))
    }

    pub fn uint(key: impl Into<String>, value: u64) -> Self {
        Self::new(key, Value::Uint(value))
    }

    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, Value::Float(value))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, Value::Bool(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Self::new(key, Value::Duration(value))
    }

    pub fn time(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::new(key, Value::Time(value))
    }

    pub fn group(key: impl Into<String>, attrs: Vec<Attr>) -> Self {
        Self::new(key, Value::Group(attrs))
    }

    /// `error=<message>`.
    pub fn error(err: &dyn std::error::Error) -> Self {
        Self::string("error", err.to_string())
    }

    /// Group built from a value that knows how to render itself.
    pub fn loggable(key: impl Into<String>, value: &dyn Loggable) -> Self {
        Self::group(key, value.log_fields())
    }
}

// =============================================================================
// Loggable
// =============================================================================

/// A value that renders itself as ordered log attributes.
///
/// Implemented by auth descriptors and other request-scoped types that the
/// access-log middleware attaches without knowing their concrete type.
///
/// ```rust
/// use slogx::{Attr, Loggable};
///
/// struct AuthInfo {
///     user: String,
///     role: String,
/// }
///
/// impl Loggable for AuthInfo {
///     fn log_fields(&self) -> Vec<Attr> {
///         vec![
///             Attr::string("user", &self.user),
///             Attr::string("role", &self.role),
///         ]
///     }
/// }
/// ```
pub trait Loggable: Send + Sync {
    fn log_fields(&self) -> Vec<Attr>;
}

// =============================================================================
// Record
// =============================================================================

/// Source location of the logging call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Source {
    pub file: &'static str,
    pub line: u32,
}

impl From<&'static Location<'static>> for Source {
    fn from(loc: &'static Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One structured log event.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub source: Option<Source>,
    pub attrs: Vec<Attr>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            message: message.into(),
            source: None,
            attrs: Vec::new(),
        }
    }

    pub fn with_attrs(mut self, attrs: Vec<Attr>) -> Self {
        self.attrs.extend(attrs);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// First top-level attribute with the given key.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.iter().find(|a| a.key == key).map(|a| &a.value)
    }
}
