//! Shared application state for Axum handlers.
//!
//! # Structured Concurrency
//!
//! Background tasks (the memory reporter) are managed using
//! `tokio_util::task::TaskTracker` and `CancellationToken`. Call `shutdown()`
//! to stop them before application exit.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::logger::Logger;
use crate::memstats::MemoryReporter;

/// Shared application state for Axum handlers.
///
/// # Lifecycle
///
/// The memory reporter is spawned when the state is created, if enabled.
/// Call `shutdown()` before dropping to ensure clean task termination:
///
/// ```rust,ignore
/// let state = AppState::new(logger, config);
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application logger, also bound to every request
    pub logger: Logger,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Application configuration
    pub config: Arc<Config>,
    /// Tracks spawned background tasks for graceful shutdown
    task_tracker: TaskTracker,
    /// Cancellation token for signaling background tasks to stop
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Create application state. Must be called within a Tokio runtime when
    /// memory reporting is enabled.
    pub fn new(logger: Logger, config: Config) -> Self {
        let state = Self {
            logger,
            started_at: Instant::now(),
            config: Arc::new(config),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        if state.config.memstat_enabled() {
            state.spawn_memory_reporter();
        } else {
            debug!("Memory reporting disabled (MEMSTAT_INTERVAL_SECS=0)");
        }

        state
    }

    /// Spawn the periodic memory reporter.
    ///
    /// The task is tracked by `task_tracker` and respects `cancellation_token`
    /// for graceful shutdown.
    fn spawn_memory_reporter(&self) {
        let reporter = MemoryReporter::new()
            .interval(self.config.memstat_interval)
            .reclaim(self.config.memstat_gc)
            .logger(self.logger.clone());

        info!(
            interval_secs = self.config.memstat_interval.as_secs(),
            gc = self.config.memstat_gc,
            "Memory reporting enabled"
        );
        self.task_tracker
            .spawn(reporter.run(self.cancellation_token.clone()));
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// This method:
    /// 1. Signals all tasks to stop via cancellation token
    /// 2. Closes the task tracker (prevents new tasks)
    /// 3. Waits for all tasks to complete
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
