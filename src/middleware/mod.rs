//! HTTP middleware for request-scoped logging.
//!
//! - **Logger binding**: attach a logger to each request ([`LoggerLayer`])
//! - **Access log**: one record per request with status, size and timing
//! - **Client IP**: header and peer-address resolution used by the access log
//!
//! # Architecture
//!
//! ```text
//! Request → LoggerLayer → AccessLogLayer → Handler → Response
//!               ↓               ↓                        ↓
//!         bind Logger     start timer          record on body end
//! ```
//!
//! `LoggerLayer` must sit outside `AccessLogLayer` (added after it with
//! `Router::layer`) for the access log to pick up the bound logger.

pub mod access_log;
pub mod ip;
pub mod request_logger;

pub use access_log::{
    ACCESS_LOG_MESSAGE, AccessLog, AccessLogLayer, AccessLogService, level_for_status,
};
pub use ip::{UNKNOWN_IP, client_ip, client_ip_string};
pub use request_logger::{LoggerLayer, LoggerService, RequestLogger};
