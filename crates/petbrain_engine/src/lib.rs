//! # Petbrain Engine
//!
//! Async runtime for per-pet brain simulations, built on Tokio.
//!
//! - [`SimulationManager`] keeps one registry entry per pet: its grid, cached
//!   parameters, subscriber count, tick driver and pending grace-period stop.
//! - [`BrainSubscription`] streams an initial snapshot followed by windowed
//!   batches of cell updates, and releases its slot when dropped.
//! - [`BrainLifecycle`] keeps brains in step with the game-state side through
//!   a [`VitalsSource`].
//!
//! Every public entry point that starts work needs a Tokio runtime; the
//! manager captures the handle of the runtime it was created on.

mod driver;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod source;
pub mod stream;

pub use error::{BrainError, Result};
pub use lifecycle::{BrainLifecycle, BrainStatus};
pub use manager::SimulationManager;
pub use source::{InMemoryVitals, VitalsSource};
pub use stream::BrainSubscription;

use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| {
        tracing::warn!("Recovered poisoned lock");
        e.into_inner()
    })
}
