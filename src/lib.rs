//! # slogx
//!
//! Structured logging for Axum services:
//!
//! - **Leveled, attribute-based logger**: JSON or text output, source
//!   locations, a process-wide default
//! - **Request-scoped loggers**: bind a logger and an auth descriptor to a
//!   request, read them back anywhere downstream
//! - **Access log**: exactly one record per HTTP exchange, level derived from
//!   the status code
//! - **Memory reports**: periodic runtime memory records on a cancellable task
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Middleware (LoggerLayer → AccessLogLayer)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ResponseObserver (status once, byte count) / ObservedBody  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Logger (cheap clone, bound attrs and groups)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handler sinks (JSON, text, discard, capture)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use slogx::{AccessLogLayer, LoggerBuilder, LoggerLayer, RequestLogger};
//!
//! let logger = LoggerBuilder::new().level("debug").build();
//!
//! let app: Router = Router::new()
//!     .route(
//!         "/",
//!         get(|RequestLogger(log): RequestLogger| async move {
//!             log.info("hello", vec![]);
//!             "ok"
//!         }),
//!     )
//!     .layer(AccessLogLayer::new("access"))
//!     .layer(LoggerLayer::new(logger));
//! ```
//!
//! Serve with `into_make_service_with_connect_info::<SocketAddr>()` so the
//! access log can fall back to the peer address.

pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod handler;
pub mod handlers;
pub mod humanize;
pub mod logger;
pub mod memstats;
pub mod middleware;
pub mod observer;
pub mod record;
pub mod recorder;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use context::{AuthInfo, LogContextExt};
pub use error::{LogError, LogResult};
pub use format::OutputFormat;
pub use handler::{
    CaptureHandler, DiscardHandler, Handler, HandlerOptions, JsonHandler, TextHandler,
};
pub use humanize::{byte_count_iec, human_size};
pub use logger::{Logger, LoggerBuilder, default_logger, set_default};
pub use memstats::{
    CountingAllocator, MemStats, MemoryReporter, MemorySampler, RuntimeSampler,
    log_memory_stats, run_periodic_memory_logging, start_periodic_memory_logging,
};
pub use middleware::{
    AccessLog, AccessLogLayer, LoggerLayer, RequestLogger, client_ip, level_for_status,
};
pub use observer::{Capabilities, ResponseObserver, ResponseStats, ResponseWriter};
pub use record::{Attr, Level, Loggable, Record, Source, Value};
pub use recorder::ResponseRecorder;
pub use routes::build_router;
pub use state::AppState;
