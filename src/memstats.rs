//! Periodic runtime memory reporting.
//!
//! A [`MemoryReporter`] samples memory statistics on a fixed interval and
//! emits one record per tick:
//!
//! ```text
//! msg="runtime MemStats" name=memory_stat alloc=1.049MB total_alloc=12.3MB sys=48.2MB num_gc=0
//! ```
//!
//! # Sampling
//!
//! Rust has no collector to ask, so statistics come from a [`MemorySampler`].
//! The default [`RuntimeSampler`] reads the counters kept by
//! [`CountingAllocator`] when it is installed as the global allocator, and
//! falls back to process-level figures from `memory-stats` otherwise:
//!
//! ```rust,ignore
//! #[global_allocator]
//! static ALLOC: slogx::CountingAllocator = slogx::CountingAllocator;
//! ```
//!
//! # Lifecycle
//!
//! The loop stops when its `CancellationToken` is cancelled. Cancellation is
//! checked before each tick, so no record is emitted once it has been
//! observed. The timer is re-armed after each emission.

use std::alloc::{GlobalAlloc, Layout, System};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::humanize::human_size;
use crate::logger::{Logger, NAME_KEY, default_logger};
use crate::record::{Attr, Level};

/// `name` attribute of memory records.
pub const MEMORY_STAT_NAME: &str = "memory_stat";

/// Message of memory records.
pub const MEMORY_STAT_MESSAGE: &str = "runtime MemStats";

/// Default reporting interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// One sample of memory statistics, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemStats {
    /// Heap bytes currently allocated.
    pub alloc: u64,
    /// Heap bytes allocated since start, never decreasing.
    pub total_alloc: u64,
    /// Bytes reserved from the operating system.
    pub sys: u64,
    /// Completed reclaim passes.
    pub num_gc: u32,
}

impl MemStats {
    fn attrs(&self) -> Vec<Attr> {
        vec![
            Attr::string(NAME_KEY, MEMORY_STAT_NAME),
            Attr::string("alloc", human_size(self.alloc)),
            Attr::string("total_alloc", human_size(self.total_alloc)),
            Attr::string("sys", human_size(self.sys)),
            Attr::uint("num_gc", u64::from(self.num_gc)),
        ]
    }
}

/// Source of [`MemStats`].
pub trait MemorySampler: Send + Sync {
    fn sample(&self) -> MemStats;

    /// Ask the allocator to give memory back before sampling.
    fn reclaim(&self) {}
}

// =============================================================================
// Counting Allocator
// =============================================================================

static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static TOTAL_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// System allocator that keeps live and cumulative byte counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingAllocator;

impl CountingAllocator {
    /// Bytes currently allocated.
    pub fn allocated() -> u64 {
        ALLOCATED.load(Ordering::Relaxed)
    }

    /// Bytes allocated since start.
    pub fn total_allocated() -> u64 {
        TOTAL_ALLOCATED.load(Ordering::Relaxed)
    }

    /// Whether this allocator has served any allocation, i.e. is installed.
    pub fn is_active() -> bool {
        ACTIVE.load(Ordering::Relaxed)
    }

    fn on_alloc(size: usize) {
        let size = size as u64;
        ALLOCATED.fetch_add(size, Ordering::Relaxed);
        TOTAL_ALLOCATED.fetch_add(size, Ordering::Relaxed);
        if !ACTIVE.load(Ordering::Relaxed) {
            ACTIVE.store(true, Ordering::Relaxed);
        }
    }

    fn on_dealloc(size: usize) {
        ALLOCATED.fetch_sub(size as u64, Ordering::Relaxed);
    }
}

#[allow(unsafe_code)]
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: forwarded unchanged; the caller upholds `GlobalAlloc::alloc`.
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            Self::on_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: as for `alloc`.
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            Self::on_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: `ptr` was returned by `System` with this `layout`.
        unsafe { System.dealloc(ptr, layout) };
        Self::on_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: `ptr` was returned by `System` with this `layout`.
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            Self::on_dealloc(layout.size());
            Self::on_alloc(new_size);
        }
        new_ptr
    }
}

// =============================================================================
// Runtime Sampler
// =============================================================================

/// Default sampler for the running process.
///
/// `num_gc` counts the reclaim passes requested through this sampler.
#[derive(Debug, Default)]
pub struct RuntimeSampler {
    reclaims: AtomicU32,
}

impl RuntimeSampler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemorySampler for RuntimeSampler {
    fn sample(&self) -> MemStats {
        let (physical, sys) = memory_stats::memory_stats().map_or((0, 0), |usage| {
            (usage.physical_mem as u64, usage.virtual_mem as u64)
        });

        let (alloc, total_alloc) = if CountingAllocator::is_active() {
            (
                CountingAllocator::allocated(),
                CountingAllocator::total_allocated(),
            )
        } else {
            (physical, physical)
        };

        MemStats {
            alloc,
            total_alloc,
            sys,
            num_gc: self.reclaims.load(Ordering::Relaxed),
        }
    }

    fn reclaim(&self) {
        // Freed memory already goes straight back to the system allocator.
        self.reclaims.fetch_add(1, Ordering::Relaxed);
    }
}

/// Emit one memory record at `level`.
#[track_caller]
pub fn log_memory_stats(logger: &Logger, level: Level, sampler: &dyn MemorySampler) {
    if !logger.enabled(level) {
        return;
    }
    logger.log(level, MEMORY_STAT_MESSAGE, sampler.sample().attrs());
}

// =============================================================================
// Reporter
// =============================================================================

/// Periodic memory reporter.
///
/// | Option | Default |
/// |--------|---------|
/// | interval | 60 s |
/// | logger | default logger at start |
/// | level | `Info` |
/// | reclaim | `false` |
/// | sampler | [`RuntimeSampler`] |
///
/// ```rust,no_run
/// use std::time::Duration;
/// use slogx::MemoryReporter;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo() {
/// let cancel = CancellationToken::new();
/// let handle = MemoryReporter::new()
///     .interval(Duration::from_secs(30))
///     .start(cancel.clone());
///
/// // ... later
/// cancel.cancel();
/// let _ = handle.await;
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryReporter {
    interval: Duration,
    logger: Option<Logger>,
    level: Level,
    reclaim: bool,
    sampler: Arc<dyn MemorySampler>,
}

impl Default for MemoryReporter {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            logger: None,
            level: Level::Info,
            reclaim: false,
            sampler: Arc::new(RuntimeSampler::new()),
        }
    }
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Request a reclaim pass before each sample.
    pub fn reclaim(mut self, reclaim: bool) -> Self {
        self.reclaim = reclaim;
        self
    }

    pub fn sampler(mut self, sampler: impl MemorySampler + 'static) -> Self {
        self.sampler = Arc::new(sampler);
        self
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let logger = self.logger.unwrap_or_else(default_logger);
        debug!(interval = ?self.interval, "Memory reporter started");

        loop {
            tokio::select! {
                biased; // Check cancellation first

                _ = cancel.cancelled() => {
                    debug!("Memory reporter received cancellation signal");
                    break;
                }
                _ = sleep(self.interval) => {
                    if self.reclaim {
                        self.sampler.reclaim();
                    }
                    log_memory_stats(&logger, self.level, self.sampler.as_ref());
                }
            }
        }

        debug!("Memory reporter shutting down");
    }

    /// Spawn [`MemoryReporter::run`] on the current runtime.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

impl fmt::Debug for MemoryReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryReporter")
            .field("interval", &self.interval)
            .field("level", &self.level)
            .field("reclaim", &self.reclaim)
            .finish_non_exhaustive()
    }
}

/// Report memory every `interval` on `logger` (or the default logger) until
/// `cancel` fires.
pub async fn run_periodic_memory_logging(
    cancel: CancellationToken,
    interval: Duration,
    logger: Option<Logger>,
    level: Level,
    reclaim: bool,
) {
    reporter(interval, logger, level, reclaim).run(cancel).await;
}

/// Detached form of [`run_periodic_memory_logging`].
pub fn start_periodic_memory_logging(
    cancel: CancellationToken,
    interval: Duration,
    logger: Option<Logger>,
    level: Level,
    reclaim: bool,
) -> JoinHandle<()> {
    reporter(interval, logger, level, reclaim).start(cancel)
}

fn reporter(
    interval: Duration,
    logger: Option<Logger>,
    level: Level,
    reclaim: bool,
) -> MemoryReporter {
    let reporter = MemoryReporter::new()
        .interval(interval)
        .level(level)
        .reclaim(reclaim);
    match logger {
        Some(logger) => reporter.logger(logger),
        None => reporter,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::handler::CaptureHandler;

    #[derive(Default)]
    struct FixedSampler {
        reclaims: AtomicU32,
    }

    impl MemorySampler for FixedSampler {
        fn sample(&self) -> MemStats {
            MemStats {
                alloc: 1_048_576,
                total_alloc: 5_000_000,
                sys: 999,
                num_gc: self.reclaims.load(Ordering::Relaxed),
            }
        }

        fn reclaim(&self) {
            self.reclaims.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_log_memory_stats_fields() {
        let capture = CaptureHandler::new();
        let logger = Logger::new(capture.clone());

        log_memory_stats(&logger, Level::Info, &FixedSampler::default());

        let records = capture.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.message, MEMORY_STAT_MESSAGE);
        assert_eq!(
            record.attr(NAME_KEY).and_then(|v| v.as_str()),
            Some(MEMORY_STAT_NAME)
        );
        assert_eq!(
            record.attr("alloc").and_then(|v| v.as_str()),
            Some("1.049MB")
        );
        assert_eq!(
            record.attr("total_alloc").and_then(|v| v.as_str()),
            Some("5MB")
        );
        assert_eq!(record.attr("sys").and_then(|v| v.as_str()), Some("999B"));
        assert_eq!(record.attr("num_gc").and_then(|v| v.as_i64()), Some(0));
    }

    #[test]
    fn test_runtime_sampler_counts_reclaims() {
        let sampler = RuntimeSampler::new();
        sampler.reclaim();
        sampler.reclaim();

        let stats = sampler.sample();
        assert_eq!(stats.num_gc, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_emits_once_per_tick() {
        let capture = CaptureHandler::new();
        let cancel = CancellationToken::new();

        let handle = MemoryReporter::new()
            .interval(Duration::from_millis(10))
            .logger(Logger::new(capture.clone()))
            .sampler(FixedSampler::default())
            .start(cancel.clone());

        sleep(Duration::from_millis(35)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(capture.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_no_tick_after_cancel() {
        let capture = CaptureHandler::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        MemoryReporter::new()
            .interval(Duration::from_millis(1))
            .logger(Logger::new(capture.clone()))
            .run(cancel)
            .await;

        assert!(capture.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_reclaims_before_sampling() {
        let capture = CaptureHandler::new();
        let cancel = CancellationToken::new();

        let handle = MemoryReporter::new()
            .interval(Duration::from_millis(10))
            .logger(Logger::new(capture.clone()))
            .reclaim(true)
            .sampler(FixedSampler::default())
            .start(cancel.clone());

        sleep(Duration::from_millis(25)).await;
        cancel.cancel();
        handle.await.unwrap();

        let counts: Vec<_> = capture
            .records()
            .iter()
            .map(|r| r.attr("num_gc").and_then(|v| v.as_i64()).unwrap())
            .collect();
        assert_eq!(counts, [1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_periodic_memory_logging_inline() {
        let capture = CaptureHandler::new();
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(15)).await;
                cancel.cancel();
            })
        };

        run_periodic_memory_logging(
            cancel,
            Duration::from_millis(10),
            Some(Logger::new(capture.clone())),
            Level::Warn,
            false,
        )
        .await;
        stopper.await.unwrap();

        let records = capture.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::Warn);
    }
}
