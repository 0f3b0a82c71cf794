//! Per-pet simulation registry and lifecycle.
//!
//! Each pet id maps to one [`BrainSlot`] behind its own mutex, so calls for
//! different pets never wait on each other: the registry lock is held only
//! long enough to look a slot up. The two locks are never held together.
//!
//! A slot that has been stopped is marked retired before it leaves the
//! registry. Anyone who finds a retired slot evicts it and starts over with
//! a fresh one, so a stop racing with a subscribe can never resurrect a dead
//! driver.

use crate::driver::Driver;
use crate::error::{BrainError, Result};
use crate::lock;
use crate::stream::{self, BrainSubscription, SubscriberGuard};
use petbrain_core::config::BrainConfig;
use petbrain_core::mapper::map_parameters;
use petbrain_core::metrics::{
    DRIVERS_STARTED, DRIVERS_STOPPED, GRACE_CANCELLED, GRACE_STOPS, GRIDS_BUILT,
};
use petbrain_core::{Grid, Metrics, RuleEngine};
use petbrain_data::{CellState, PetVitals, SimulationParameters};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Everything the manager keeps for one pet.
#[derive(Debug, Default)]
pub(crate) struct BrainSlot {
    pub(crate) grid: Option<Arc<Mutex<Grid>>>,
    pub(crate) params: Option<SimulationParameters>,
    /// Bumped every time the grid is replaced.
    pub(crate) generation: u64,
    pub(crate) subscribers: usize,
    driver: Option<Driver>,
    pending_stop: Option<JoinHandle<()>>,
    /// Identifies the armed grace timer; bumped on every arm and cancel.
    stop_token: u64,
    pub(crate) retired: bool,
}

pub(crate) type SharedSlot = Arc<Mutex<BrainSlot>>;

#[derive(Debug)]
struct Inner {
    config: BrainConfig,
    engine: Arc<RuleEngine>,
    metrics: Arc<Metrics>,
    runtime: Handle,
    registry: Mutex<HashMap<Uuid, SharedSlot>>,
}

/// Owns every pet's brain. Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct SimulationManager {
    inner: Arc<Inner>,
}

impl SimulationManager {
    /// Creates a manager bound to the current Tokio runtime.
    ///
    /// # Panics
    /// When called outside a Tokio runtime.
    pub fn new(config: BrainConfig) -> Result<Self> {
        Self::with_runtime(config, Handle::current())
    }

    /// Creates a manager whose drivers and timers run on `runtime`.
    pub fn with_runtime(config: BrainConfig, runtime: Handle) -> Result<Self> {
        config
            .validate()
            .map_err(|e| BrainError::config(e.to_string()))?;

        let engine = RuleEngine::new(config.synaptic_weights, config.simulation.paused);
        tracing::info!(
            fingerprint = %config.fingerprint(),
            paused = config.simulation.paused,
            grace_ms = config.simulation.shutdown_grace_period_ms,
            "Simulation manager ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                engine: Arc::new(engine),
                metrics: Arc::new(Metrics::new()),
                runtime,
                registry: Mutex::new(HashMap::new()),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &BrainConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    /// Runtime that drivers, timers and pumps are spawned on.
    #[must_use]
    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// Freezes or resumes every brain at once.
    pub fn set_paused(&self, paused: bool) {
        self.inner.engine.set_paused(paused);
        tracing::info!(paused, "Simulation pause toggled");
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.engine.is_paused()
    }

    /// Builds the pet's grid if it has none yet. Does not start a driver.
    pub fn ensure_initialized(&self, pet_id: Uuid, vitals: &PetVitals) {
        self.with_slot(pet_id, |slot| {
            if slot.grid.is_none() {
                self.build_grid(pet_id, slot, map_parameters(vitals));
            }
        });
    }

    /// Recomputes the pet's parameters from fresh vitals.
    ///
    /// A different grid size replaces the grid (restarting the driver only if
    /// one was running). Otherwise the new parameters are cached and, when a
    /// driver is running, applied to it from its next tick on.
    pub fn update_state(&self, pet_id: Uuid, vitals: &PetVitals) {
        let params = map_parameters(vitals);
        self.with_slot(pet_id, |slot| {
            let Some(current) = slot.params.filter(|_| slot.grid.is_some()) else {
                self.build_grid(pet_id, slot, params);
                return;
            };

            if current.grid_size != params.grid_size {
                let was_running = self.stop_driver(pet_id, slot);
                self.build_grid(pet_id, slot, params);
                tracing::info!(
                    pet_id = %pet_id,
                    from = current.grid_size,
                    to = params.grid_size,
                    "Brain grid resized"
                );
                if was_running {
                    self.start_driver(pet_id, slot);
                }
                return;
            }

            slot.params = Some(params);
            match &slot.driver {
                Some(driver) => {
                    driver.apply(params);
                    tracing::debug!(pet_id = %pet_id, "Parameters applied to running brain");
                }
                None => {
                    tracing::debug!(pet_id = %pet_id, "Parameters cached for idle brain");
                }
            }
        });
    }

    /// Adds an observer, starting the driver if this is the first one.
    ///
    /// The returned stream yields the full grid first, then one batch per
    /// window that saw any cell update.
    pub fn subscribe(&self, pet_id: Uuid, vitals: &PetVitals) -> BrainSubscription {
        let (slot, _) = self.with_slot_shared(pet_id, |slot| {
            if slot.grid.is_none() {
                self.build_grid(pet_id, slot, map_parameters(vitals));
            }
            slot.subscribers += 1;

            if let Some(timer) = slot.pending_stop.take() {
                timer.abort();
                slot.stop_token += 1;
                self.inner.metrics.increment_counter(GRACE_CANCELLED);
                tracing::info!(pet_id = %pet_id, "Observer returned, grace stop cancelled");
            }
            if slot.driver.is_none() {
                self.start_driver(pet_id, slot);
            }

            tracing::debug!(pet_id = %pet_id, subscribers = slot.subscribers, "Observer attached");
        });

        let guard = SubscriberGuard::new(self.clone(), pet_id, Arc::clone(&slot));
        stream::open(
            &self.inner.runtime,
            slot,
            self.inner.config.simulation.batch_window(),
            guard,
        )
    }

    /// Halts the pet's driver and discards everything kept for it.
    ///
    /// Returns whether there was anything to stop. Open subscriptions end.
    pub fn stop(&self, pet_id: Uuid) -> bool {
        let removed = lock(&self.inner.registry).remove(&pet_id);
        let Some(slot) = removed else {
            return false;
        };

        let mut guard = lock(&slot);
        if guard.retired {
            return false;
        }
        self.retire(pet_id, &mut guard);
        tracing::info!(pet_id = %pet_id, "Brain stopped");
        true
    }

    /// Stops every brain and cancels every pending timer.
    pub fn shutdown(&self) {
        let slots: Vec<_> = lock(&self.inner.registry).drain().collect();
        let count = slots.len();
        for (pet_id, slot) in slots {
            let mut guard = lock(&slot);
            if !guard.retired {
                self.retire(pet_id, &mut guard);
            }
        }
        tracing::info!(brains = count, "Simulation manager shut down");
    }

    #[must_use]
    pub fn has_brain(&self, pet_id: Uuid) -> bool {
        self.inspect(pet_id, |slot| slot.grid.is_some())
            .unwrap_or(false)
    }

    #[must_use]
    pub fn is_running(&self, pet_id: Uuid) -> bool {
        self.inspect(pet_id, |slot| slot.driver.is_some())
            .unwrap_or(false)
    }

    #[must_use]
    pub fn subscriber_count(&self, pet_id: Uuid) -> usize {
        self.inspect(pet_id, |slot| slot.subscribers).unwrap_or(0)
    }

    /// Whether a grace-period stop is armed for the pet.
    #[must_use]
    pub fn is_stop_pending(&self, pet_id: Uuid) -> bool {
        self.inspect(pet_id, |slot| slot.pending_stop.is_some())
            .unwrap_or(false)
    }

    #[must_use]
    pub fn parameters(&self, pet_id: Uuid) -> Option<SimulationParameters> {
        self.inspect(pet_id, |slot| slot.params).flatten()
    }

    #[must_use]
    pub fn grid_size(&self, pet_id: Uuid) -> Option<usize> {
        self.grid(pet_id).map(|grid| lock(&grid).width())
    }

    /// Ticks evaluated on the pet's current grid.
    #[must_use]
    pub fn tick(&self, pet_id: Uuid) -> Option<u64> {
        self.grid(pet_id).map(|grid| lock(&grid).tick())
    }

    #[must_use]
    pub fn snapshot(&self, pet_id: Uuid) -> Option<Vec<CellState>> {
        self.grid(pet_id).map(|grid| lock(&grid).snapshot())
    }

    /// Number of pets with a live registry entry.
    #[must_use]
    pub fn brain_count(&self) -> usize {
        lock(&self.inner.registry).len()
    }

    /// Drops one observer. The last one out arms the grace-period stop.
    pub(crate) fn release(&self, pet_id: Uuid, slot: &SharedSlot) {
        let mut guard = lock(slot);
        if guard.retired {
            return;
        }
        guard.subscribers = guard.subscribers.saturating_sub(1);
        tracing::debug!(pet_id = %pet_id, subscribers = guard.subscribers, "Observer detached");
        if guard.subscribers > 0 {
            return;
        }

        if let Some(previous) = guard.pending_stop.take() {
            previous.abort();
        }
        guard.stop_token += 1;
        let token = guard.stop_token;
        let grace = self.inner.config.simulation.grace_period();
        let manager = self.clone();
        let timer_slot = Arc::clone(slot);
        guard.pending_stop = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            manager.expire(pet_id, &timer_slot, token);
        }));
        tracing::info!(
            pet_id = %pet_id,
            grace_ms = grace.as_millis() as u64,
            "Last observer left, stop scheduled"
        );
    }

    /// Grace period elapsed: stop only if nobody came back meanwhile.
    ///
    /// A timer that was cancelled or replaced after it woke up finds a newer
    /// token and leaves the slot alone.
    fn expire(&self, pet_id: Uuid, slot: &SharedSlot, token: u64) {
        {
            let mut guard = lock(slot);
            if guard.stop_token != token {
                tracing::debug!(pet_id = %pet_id, "Superseded grace timer ignored");
                return;
            }
            // our own handle; dropping it just detaches
            guard.pending_stop = None;
            if guard.retired || guard.subscribers > 0 {
                return;
            }
            self.retire(pet_id, &mut guard);
        }
        self.evict(pet_id, slot);
        self.inner.metrics.increment_counter(GRACE_STOPS);
        tracing::info!(pet_id = %pet_id, "Grace period elapsed, brain stopped");
    }

    fn with_slot<R>(&self, pet_id: Uuid, f: impl FnOnce(&mut BrainSlot) -> R) -> R {
        self.with_slot_shared(pet_id, f).1
    }

    /// Runs `f` on the live slot for `pet_id`, creating it when missing.
    fn with_slot_shared<R>(
        &self,
        pet_id: Uuid,
        f: impl FnOnce(&mut BrainSlot) -> R,
    ) -> (SharedSlot, R) {
        loop {
            let slot = {
                let mut registry = lock(&self.inner.registry);
                Arc::clone(registry.entry(pet_id).or_default())
            };
            let mut guard = lock(&slot);
            if guard.retired {
                drop(guard);
                self.evict(pet_id, &slot);
                continue;
            }
            let result = f(&mut guard);
            drop(guard);
            return (slot, result);
        }
    }

    /// Read-only view of a live slot, without creating one.
    fn inspect<R>(&self, pet_id: Uuid, f: impl FnOnce(&BrainSlot) -> R) -> Option<R> {
        let slot = lock(&self.inner.registry).get(&pet_id).cloned()?;
        let guard = lock(&slot);
        if guard.retired {
            return None;
        }
        Some(f(&guard))
    }

    fn grid(&self, pet_id: Uuid) -> Option<Arc<Mutex<Grid>>> {
        self.inspect(pet_id, |slot| slot.grid.clone()).flatten()
    }

    /// Removes `slot` from the registry if it is still the entry for `pet_id`.
    fn evict(&self, pet_id: Uuid, slot: &SharedSlot) {
        let mut registry = lock(&self.inner.registry);
        if registry
            .get(&pet_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            registry.remove(&pet_id);
        }
    }

    fn build_grid(&self, pet_id: Uuid, slot: &mut BrainSlot, params: SimulationParameters) {
        let sim = &self.inner.config.simulation;
        let mut grid = Grid::square(params.grid_size, sim.grid_seed, sim.cell_channel_capacity);
        grid.seed_center();

        slot.grid = Some(Arc::new(Mutex::new(grid)));
        slot.params = Some(params);
        slot.generation += 1;
        self.inner.metrics.increment_counter(GRIDS_BUILT);
        tracing::info!(
            pet_id = %pet_id,
            grid_size = params.grid_size,
            tick_ms = params.tick_interval_ms,
            "Brain grid initialized"
        );
    }

    fn start_driver(&self, pet_id: Uuid, slot: &mut BrainSlot) {
        let (Some(grid), Some(params)) = (slot.grid.as_ref(), slot.params) else {
            return;
        };
        slot.driver = Some(Driver::spawn(
            &self.inner.runtime,
            pet_id,
            Arc::clone(grid),
            Arc::clone(&self.inner.engine),
            Arc::clone(&self.inner.metrics),
            params,
        ));
        self.inner.metrics.increment_counter(DRIVERS_STARTED);
        tracing::info!(pet_id = %pet_id, tick_ms = params.tick_interval_ms, "Brain driver started");
    }

    /// Returns whether a driver was running.
    fn stop_driver(&self, pet_id: Uuid, slot: &mut BrainSlot) -> bool {
        let Some(driver) = slot.driver.take() else {
            return false;
        };
        driver.stop();
        self.inner.metrics.increment_counter(DRIVERS_STOPPED);
        tracing::info!(pet_id = %pet_id, "Brain driver stopped");
        true
    }

    fn retire(&self, pet_id: Uuid, slot: &mut BrainSlot) {
        if let Some(timer) = slot.pending_stop.take() {
            timer.abort();
        }
        self.stop_driver(pet_id, slot);
        slot.grid = None;
        slot.params = None;
        slot.subscribers = 0;
        slot.retired = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petbrain_data::{EvolutionPath, PetStage};
    use std::time::Duration;

    const GRACE_MS: u64 = 1_000;

    fn manager() -> SimulationManager {
        let mut config = BrainConfig::default();
        config.simulation.shutdown_grace_period_ms = GRACE_MS;
        SimulationManager::new(config).unwrap()
    }

    fn egg() -> PetVitals {
        PetVitals::new(50, 50, 100, PetStage::Egg, EvolutionPath::Healthy)
    }

    fn baby() -> PetVitals {
        PetVitals {
            stage: Some(PetStage::Baby),
            ..egg()
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_rejected() {
        let mut config = BrainConfig::default();
        config.simulation.batch_window_ms = 0;
        let err = SimulationManager::new(config).unwrap_err();
        assert!(matches!(err, BrainError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_initialized_is_idempotent() {
        let manager = manager();
        let id = Uuid::new_v4();
        manager.ensure_initialized(id, &egg());
        manager.ensure_initialized(id, &baby());

        assert_eq!(manager.grid_size(id), Some(20));
        assert!(!manager.is_running(id));
        assert_eq!(manager.metrics().counter(GRIDS_BUILT), 1);

        let snapshot = manager.snapshot(id).unwrap();
        let firing: Vec<_> = snapshot.iter().filter(|c| c.is_firing).collect();
        assert_eq!(firing.len(), 1);
        assert_eq!((firing[0].x, firing[0].y), (10, 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_subscriber_starts_single_driver() {
        let manager = manager();
        let id = Uuid::new_v4();
        let _a = manager.subscribe(id, &egg());
        assert!(manager.is_running(id));
        assert_eq!(manager.subscriber_count(id), 1);

        let _b = manager.subscribe(id, &egg());
        assert_eq!(manager.subscriber_count(id), 2);
        assert_eq!(manager.metrics().counter(DRIVERS_STARTED), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_while_idle_only_caches() {
        let manager = manager();
        let id = Uuid::new_v4();
        manager.ensure_initialized(id, &egg());

        let hungry = PetVitals { hunger: 100, ..egg() };
        manager.update_state(id, &hungry);

        assert!(!manager.is_running(id));
        let params = manager.parameters(id).unwrap();
        assert!((params.firing_threshold - 1.0).abs() < 1e-9);
        assert_eq!(manager.metrics().counter(GRIDS_BUILT), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_initializes_unknown_pet() {
        let manager = manager();
        let id = Uuid::new_v4();
        manager.update_state(id, &baby());
        assert_eq!(manager.grid_size(id), Some(35));
        assert!(!manager.is_running(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_while_idle_does_not_start_driver() {
        let manager = manager();
        let id = Uuid::new_v4();
        manager.ensure_initialized(id, &egg());
        manager.update_state(id, &baby());

        assert_eq!(manager.grid_size(id), Some(35));
        assert_eq!(manager.tick(id), Some(0));
        assert!(!manager.is_running(id));
        assert_eq!(manager.metrics().counter(DRIVERS_STARTED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_while_running_restarts_driver() {
        let manager = manager();
        let id = Uuid::new_v4();
        let _sub = manager.subscribe(id, &egg());
        sleep_ms(500).await;
        assert!(manager.tick(id).unwrap() > 0);

        manager.update_state(id, &baby());
        assert_eq!(manager.grid_size(id), Some(35));
        assert_eq!(manager.tick(id), Some(0));
        assert!(manager.is_running(id));
        assert_eq!(manager.metrics().counter(DRIVERS_STARTED), 2);
        assert_eq!(manager.metrics().counter(DRIVERS_STOPPED), 1);

        // baby ticks every 120ms
        sleep_ms(250).await;
        assert_eq!(manager.tick(id), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_stops_abandoned_brain() {
        let manager = manager();
        let id = Uuid::new_v4();
        let sub = manager.subscribe(id, &egg());
        sleep_ms(200).await;
        drop(sub);

        sleep_ms(GRACE_MS / 2).await;
        assert!(manager.is_running(id));
        assert!(manager.is_stop_pending(id));
        assert_eq!(manager.subscriber_count(id), 0);

        sleep_ms(GRACE_MS).await;
        assert!(!manager.is_running(id));
        assert!(!manager.has_brain(id));
        assert_eq!(manager.brain_count(), 0);
        assert_eq!(manager.metrics().counter(GRACE_STOPS), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_within_grace_keeps_state() {
        let manager = manager();
        let id = Uuid::new_v4();
        let sub = manager.subscribe(id, &egg());
        sleep_ms(400).await;
        drop(sub);

        sleep_ms(GRACE_MS / 2).await;
        let before = manager.tick(id).unwrap();
        assert!(before > 0);

        let _back = manager.subscribe(id, &egg());
        assert!(!manager.is_stop_pending(id));
        assert_eq!(manager.metrics().counter(GRACE_CANCELLED), 1);
        assert!(manager.tick(id).unwrap() >= before);

        sleep_ms(GRACE_MS * 2).await;
        assert!(manager.is_running(id));
        assert_eq!(manager.metrics().counter(GRACE_STOPS), 0);
        assert_eq!(manager.metrics().counter(DRIVERS_STARTED), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_timer_does_not_cut_rearmed_grace_short() {
        let manager = manager();
        let id = Uuid::new_v4();
        drop(manager.subscribe(id, &egg()));
        let slot = lock(&manager.inner.registry).get(&id).cloned().unwrap();
        let stale = lock(&slot).stop_token;

        // observer returns and leaves again before the first timer gets the lock
        drop(manager.subscribe(id, &egg()));
        assert!(lock(&slot).stop_token > stale);

        manager.expire(id, &slot, stale);
        assert!(manager.is_running(id));
        assert!(manager.is_stop_pending(id));
        assert_eq!(manager.metrics().counter(GRACE_STOPS), 0);

        sleep_ms(GRACE_MS + 10).await;
        assert!(!manager.has_brain(id));
        assert_eq!(manager.metrics().counter(GRACE_STOPS), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_everything() {
        let manager = manager();
        let id = Uuid::new_v4();
        let _sub = manager.subscribe(id, &egg());
        assert!(manager.stop(id));

        assert!(!manager.has_brain(id));
        assert!(!manager.is_running(id));
        assert_eq!(manager.subscriber_count(id), 0);
        assert_eq!(manager.parameters(id), None);
        assert!(!manager.stop(id), "second stop is a no-op");
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_after_stop_starts_fresh() {
        let manager = manager();
        let id = Uuid::new_v4();
        let old = manager.subscribe(id, &egg());
        sleep_ms(400).await;
        manager.stop(id);
        drop(old);

        let _new = manager.subscribe(id, &egg());
        assert_eq!(manager.subscriber_count(id), 1);
        assert_eq!(manager.tick(id), Some(0));
        assert!(manager.is_running(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_every_brain() {
        let manager = manager();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let _sa = manager.subscribe(a, &egg());
        let _sb = manager.subscribe(b, &baby());
        sleep_ms(300).await;

        manager.set_paused(true);
        assert!(manager.is_paused());
        let (ta, tb) = (manager.tick(a), manager.tick(b));
        sleep_ms(1_000).await;
        assert_eq!(manager.tick(a), ta);
        assert_eq!(manager.tick(b), tb);

        manager.set_paused(false);
        sleep_ms(300).await;
        assert!(manager.tick(a) > ta);
        assert!(manager.tick(b) > tb);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_clears_registry() {
        let manager = manager();
        let ids: Vec<_> = (0..3).map(|_| Uuid::new_v4()).collect();
        let subs: Vec<_> = ids.iter().map(|&id| manager.subscribe(id, &egg())).collect();
        assert_eq!(manager.brain_count(), 3);

        manager.shutdown();
        assert_eq!(manager.brain_count(), 0);
        assert!(ids.iter().all(|&id| !manager.is_running(id)));
        assert_eq!(manager.metrics().counter(DRIVERS_STOPPED), 3);

        drop(subs);
        sleep_ms(GRACE_MS * 2).await;
        assert_eq!(manager.metrics().counter(GRACE_STOPS), 0);
    }
}
