use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide error type.
///
/// Most of the crate is infallible by contract: malformed client IPs degrade
/// to `"unknown"`, sink failures are swallowed by [`Logger`](crate::Logger).
/// What remains are construction-time configuration problems and the one
/// caller-visible capability failure of the response observer.
#[derive(Error, Debug)]
pub enum LogError {
    /// The wrapped response writer cannot hand over its raw connection.
    #[error("the hijacker interface is not supported")]
    HijackUnsupported,

    #[error("Error on opening logging file {}: {source}", path.display())]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unknown output format '{0}'")]
    UnknownOutputFormat(String),

    #[error("unknown log level '{0}'")]
    UnknownLevel(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with LogError.
pub type LogResult<T> = Result<T, LogError>;
