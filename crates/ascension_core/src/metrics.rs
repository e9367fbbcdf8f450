//! Engine counters and logging setup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Counters for engine activity, safe to share behind an `Arc`.
pub struct Metrics {
    tick_count: AtomicU64,
    counters: Mutex<HashMap<String, u64>>,
    start_time: Instant,
    summary_every: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tick_count: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
            summary_every: 1000,
        }
    }

    /// Records one controller tick. Logs a summary every 1000 ticks.
    pub fn record_tick(&self, controller: &str, duration: Duration) {
        let tick = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.increment_counter(controller);
        if tick % self.summary_every == 0 {
            tracing::info!(
                tick,
                controller,
                duration_us = duration.as_micros() as u64,
                uptime_s = self.elapsed().as_secs(),
                "Engine ticks"
            );
        }
    }

    pub fn increment_counter(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry(name.to_string()).or_insert(0) += 1;
    }

    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Installs a global `tracing` subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .finish(),
    )
    .ok();
}
