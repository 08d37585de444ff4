//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   LoggerLayer    │ ← binds AppState.logger to the request
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  AccessLogLayer  │ ← one "Request" record per exchange
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `/` - Greeting
//! - `/echo` - Body echo, reports `X-User` as auth
//! - `/health` - Health check
//! - `/memory` - Memory sample

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use crate::handlers;
use crate::middleware::{AccessLogLayer, LoggerLayer};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// Records for requests without a bound logger go to `state.logger`.
pub fn build_router(state: AppState) -> Router {
    let logger = state.logger.clone();
    let access_log_name = state.config.access_log_name.clone();

    let router = Router::new()
        .route("/", get(handlers::index))
        .route("/echo", post(handlers::echo))
        .route("/health", get(handlers::health_check))
        .route("/memory", get(handlers::memory));

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. Access log
    info!(name = %access_log_name, "Access logging enabled");
    let router =
        router.layer(AccessLogLayer::new(access_log_name).with_fallback(logger.clone()));

    // 2. Logger binding - outermost so the access log sees it
    router.layer(LoggerLayer::new(logger)).with_state(state)
}
