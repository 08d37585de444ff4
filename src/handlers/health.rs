//! Health and memory endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness with version and uptime
//! - `GET /memory` - Current memory sample, raw bytes

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::memstats::{MemStats, MemorySampler, RuntimeSampler};
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "uptime_seconds": 42,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Memory sample endpoint.
pub async fn memory() -> Json<MemStats> {
    Json(RuntimeSampler::new().sample())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            uptime_seconds: 7,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&response).expect("Serialization should succeed");
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptime_seconds\":7"));
    }
}
