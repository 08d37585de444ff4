use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::LogError;

/// Encoding used by loggers created through [`LoggerBuilder`](crate::LoggerBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

impl OutputFormat {
    /// Format from its name. Unknown names select `Json`.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|e| {
            warn!("{e}, using {}", OutputFormat::Json);
            OutputFormat::Json
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            _ => Err(LogError::UnknownOutputFormat(s.to_string())),
        }
    }
}
