//! Runtime metrics for the brain simulations.
//!
//! One collector is shared by every tick driver, so all counters are atomic
//! and named counters sit behind a mutex that is only touched on lifecycle
//! events, never per cell.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

pub const DRIVERS_STARTED: &str = "drivers_started";
pub const DRIVERS_STOPPED: &str = "drivers_stopped";
pub const GRIDS_BUILT: &str = "grids_built";
pub const GRACE_STOPS: &str = "grace_stops";
pub const GRACE_CANCELLED: &str = "grace_cancelled";

/// Logs a summary every this many ticks across all drivers.
const SUMMARY_EVERY: u64 = 1000;

/// Metrics shared by all simulations in a process.
#[derive(Debug)]
pub struct Metrics {
    tick_count: AtomicU64,
    cells_fired: AtomicU64,
    counters: Mutex<HashMap<String, u64>>,
    start_time: Instant,
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
            cells_fired: AtomicU64::new(0),
            counters: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records one evaluated tick of one grid.
    pub fn record_tick(&self, duration: Duration, cells: usize, firing: usize) {
        let tick = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.cells_fired.fetch_add(firing as u64, Ordering::Relaxed);

        if tick % SUMMARY_EVERY == 0 {
            tracing::info!(
                tick,
                cells,
                firing,
                cells_fired = self.cells_fired(),
                duration_us = duration.as_micros() as u64,
                "Simulation tick"
            );
        }
    }

    pub fn increment_counter(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Current value of a named counter, zero if never incremented.
    #[must_use]
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.get(name).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    /// Firing cells summed over every recorded tick.
    #[must_use]
    pub fn cells_fired(&self) -> u64 {
        self.cells_fired.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Installs the global fmt subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .finish(),
    )
    .ok();
}
