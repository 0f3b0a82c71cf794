//! Keeps brains in step with pet lifecycle events.
//!
//! Brains are never started here: a driver only runs while someone is
//! watching. This layer just keeps the cached parameters fresh, reacts to
//! evolution and death, and gates new streams on the pet being alive.

use crate::error::{BrainError, Result};
use crate::lock;
use crate::manager::SimulationManager;
use crate::source::VitalsSource;
use crate::stream::BrainSubscription;
use petbrain_core::config::LifecycleConfig;
use petbrain_data::{EvolutionPath, PetStage, PetStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

pub const STATUS_READY: &str = "Ready";
pub const STATUS_DEAD: &str = "Pet is dead";

/// Whether a pet's brain can be streamed, plus what the manager knows about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainStatus {
    pub pet_id: Uuid,
    pub available: bool,
    pub message: String,
    pub stage: Option<PetStage>,
    pub evolution_path: Option<EvolutionPath>,
    pub running: bool,
    pub subscribers: usize,
}

/// Connects a [`SimulationManager`] to a [`VitalsSource`].
#[derive(Clone)]
pub struct BrainLifecycle {
    manager: SimulationManager,
    source: Arc<dyn VitalsSource>,
    poll_interval: Duration,
    pollers: Arc<Mutex<HashMap<Uuid, Poller>>>,
    next_poller: Arc<AtomicU64>,
}

#[derive(Debug)]
struct Poller {
    seq: u64,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for BrainLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrainLifecycle")
            .field("poll_interval", &self.poll_interval)
            .field("tracked", &self.tracked_pets())
            .finish_non_exhaustive()
    }
}

impl BrainLifecycle {
    #[must_use]
    pub fn new(
        manager: SimulationManager,
        source: Arc<dyn VitalsSource>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            manager,
            source,
            poll_interval: config.poll_interval(),
            pollers: Arc::new(Mutex::new(HashMap::new())),
            next_poller: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn manager(&self) -> &SimulationManager {
        &self.manager
    }

    /// Starts refreshing the pet's cached parameters every poll interval.
    ///
    /// Does not build a grid or start a driver. Calling it again for the
    /// same pet replaces the previous poller.
    pub fn on_pet_created(&self, pet_id: Uuid) {
        tracing::info!(pet_id = %pet_id, "Pet created, brain starts on first observer");

        let manager = self.manager.clone();
        let source = Arc::clone(&self.source);
        let period = self.poll_interval;
        let pollers = Arc::clone(&self.pollers);
        let seq = self.next_poller.fetch_add(1, Ordering::Relaxed);

        // held across the spawn so the task cannot deregister before it is registered
        let mut registry = lock(&self.pollers);
        let handle = self.manager.runtime().spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match refresh(&manager, source.as_ref(), pet_id).await {
                    Ok(()) => {}
                    Err(BrainError::NotFound(_)) => {
                        tracing::warn!(pet_id = %pet_id, "Pet vanished, vitals polling stopped");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(pet_id = %pet_id, error = %e, "Vitals refresh skipped");
                    }
                }
            }
            let mut pollers = lock(&pollers);
            if pollers.get(&pet_id).is_some_and(|p| p.seq == seq) {
                pollers.remove(&pet_id);
            }
        });

        if let Some(previous) = registry.insert(pet_id, Poller { seq, handle }) {
            previous.handle.abort();
        }
    }

    /// Refreshes right away so a new stage resizes the grid without waiting
    /// for the next poll.
    pub async fn on_pet_evolved(&self, pet_id: Uuid) {
        tracing::info!(pet_id = %pet_id, "Pet evolved, refreshing brain parameters");
        if let Err(e) = self.refresh(pet_id).await {
            tracing::error!(pet_id = %pet_id, error = %e, "Failed to refresh brain after evolution");
        }
    }

    /// Cancels polling and discards the brain.
    pub fn on_pet_died(&self, pet_id: Uuid) {
        tracing::info!(pet_id = %pet_id, "Pet died, stopping brain");
        if let Some(poller) = lock(&self.pollers).remove(&pet_id) {
            poller.handle.abort();
        }
        self.manager.stop(pet_id);
    }

    /// Pulls the pet's vitals and pushes them to the manager.
    pub async fn refresh(&self, pet_id: Uuid) -> Result<()> {
        refresh(&self.manager, self.source.as_ref(), pet_id).await
    }

    /// Whether the pet's brain may be streamed right now.
    ///
    /// Unknown pets are an error; dead pets get an unavailable status.
    pub async fn status(&self, pet_id: Uuid) -> Result<BrainStatus> {
        let status = self.fetch(pet_id).await?;
        let (available, message) = if status.alive {
            (true, STATUS_READY)
        } else {
            (false, STATUS_DEAD)
        };

        Ok(BrainStatus {
            pet_id,
            available,
            message: message.to_string(),
            stage: status.vitals.stage,
            evolution_path: status.vitals.evolution_path,
            running: self.manager.is_running(pet_id),
            subscribers: self.manager.subscriber_count(pet_id),
        })
    }

    /// Subscribes to a living pet's brain using its current vitals.
    pub async fn open_stream(&self, pet_id: Uuid) -> Result<BrainSubscription> {
        let status = self.fetch(pet_id).await?;
        if !status.alive {
            tracing::warn!(pet_id = %pet_id, "Refusing brain stream for dead pet");
            return Err(BrainError::NotAlive(pet_id));
        }

        tracing::info!(
            pet_id = %pet_id,
            stage = ?status.vitals.stage,
            path = ?status.vitals.evolution_path,
            "Opening brain stream"
        );
        Ok(self.manager.subscribe(pet_id, &status.vitals))
    }

    /// Pets with an active vitals poller.
    #[must_use]
    pub fn tracked_pets(&self) -> usize {
        lock(&self.pollers)
            .values()
            .filter(|poller| !poller.handle.is_finished())
            .count()
    }

    /// Cancels every poller. Brains are left to the manager.
    pub fn shutdown(&self) {
        let pollers: Vec<_> = lock(&self.pollers).drain().collect();
        for (_, poller) in pollers {
            poller.handle.abort();
        }
    }

    async fn fetch(&self, pet_id: Uuid) -> Result<PetStatus> {
        fetch(self.source.as_ref(), pet_id).await
    }
}

async fn fetch(source: &dyn VitalsSource, pet_id: Uuid) -> Result<PetStatus> {
    source
        .pet_status(pet_id)
        .await
        .map_err(|e| BrainError::source_failure(pet_id, &e))?
        .ok_or(BrainError::NotFound(pet_id))
}

/// Dead pets are left alone; their death notification does the cleanup.
async fn refresh(
    manager: &SimulationManager,
    source: &dyn VitalsSource,
    pet_id: Uuid,
) -> Result<()> {
    let status = fetch(source, pet_id).await?;
    if !status.alive {
        return Err(BrainError::NotAlive(pet_id));
    }
    manager.update_state(pet_id, &status.vitals);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryVitals;
    use async_trait::async_trait;
    use petbrain_core::config::BrainConfig;
    use petbrain_data::PetVitals;

    const POLL_MS: u64 = 5_000;

    struct FailingSource;

    #[async_trait]
    impl VitalsSource for FailingSource {
        async fn pet_status(&self, _pet_id: Uuid) -> anyhow::Result<Option<PetStatus>> {
            anyhow::bail!("query gateway unavailable")
        }
    }

    fn setup() -> (BrainLifecycle, InMemoryVitals) {
        let manager = SimulationManager::new(BrainConfig::default()).unwrap();
        let source = InMemoryVitals::new();
        let lifecycle = BrainLifecycle::new(
            manager,
            Arc::new(source.clone()),
            &LifecycleConfig {
                poll_interval_ms: POLL_MS,
            },
        );
        (lifecycle, source)
    }

    fn egg() -> PetVitals {
        PetVitals::new(20, 70, 90, PetStage::Egg, EvolutionPath::Healthy)
    }

    #[tokio::test(start_paused = true)]
    async fn test_created_pet_gets_parameters_without_driver() {
        let (lifecycle, source) = setup();
        let id = Uuid::new_v4();
        source.insert(id, egg());
        lifecycle.on_pet_created(id);
        assert_eq!(lifecycle.tracked_pets(), 1);
        assert!(!lifecycle.manager().has_brain(id));

        tokio::time::sleep(Duration::from_millis(POLL_MS + 100)).await;
        assert_eq!(lifecycle.manager().grid_size(id), Some(20));
        assert!(!lifecycle.manager().is_running(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_picks_up_new_vitals() {
        let (lifecycle, source) = setup();
        let id = Uuid::new_v4();
        source.insert(id, egg());
        lifecycle.on_pet_created(id);
        tokio::time::sleep(Duration::from_millis(POLL_MS + 100)).await;

        source.set_vitals(id, PetVitals { hunger: 100, ..egg() });
        tokio::time::sleep(Duration::from_millis(POLL_MS)).await;
        let params = lifecycle.manager().parameters(id).unwrap();
        assert!((params.firing_threshold - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evolution_resizes_immediately() {
        let (lifecycle, source) = setup();
        let id = Uuid::new_v4();
        source.insert(id, egg());
        let _stream = lifecycle.open_stream(id).await.unwrap();
        assert_eq!(lifecycle.manager().grid_size(id), Some(20));

        source.set_vitals(
            id,
            PetVitals {
                stage: Some(PetStage::Baby),
                ..egg()
            },
        );
        lifecycle.on_pet_evolved(id).await;
        assert_eq!(lifecycle.manager().grid_size(id), Some(35));
        assert!(lifecycle.manager().is_running(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_death_stops_brain_and_polling() {
        let (lifecycle, source) = setup();
        let id = Uuid::new_v4();
        source.insert(id, egg());
        lifecycle.on_pet_created(id);
        let mut stream = lifecycle.open_stream(id).await.unwrap();
        assert!(lifecycle.manager().is_running(id));

        source.kill(id);
        lifecycle.on_pet_died(id);
        assert_eq!(lifecycle.tracked_pets(), 0);
        assert!(!lifecycle.manager().has_brain(id));

        while stream.next_batch().await.is_some() {}

        tokio::time::sleep(Duration::from_millis(POLL_MS * 3)).await;
        assert!(!lifecycle.manager().has_brain(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_messages() {
        let (lifecycle, source) = setup();
        let id = Uuid::new_v4();

        let err = lifecycle.status(id).await.unwrap_err();
        assert!(matches!(err, BrainError::NotFound(_)));

        source.insert(id, egg());
        let status = lifecycle.status(id).await.unwrap();
        assert!(status.available);
        assert_eq!(status.message, STATUS_READY);
        assert_eq!(status.stage, Some(PetStage::Egg));
        assert!(!status.running);

        source.kill(id);
        let status = lifecycle.status(id).await.unwrap();
        assert!(!status.available);
        assert_eq!(status.message, STATUS_DEAD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_stream_rejects_unknown_and_dead() {
        let (lifecycle, source) = setup();
        let id = Uuid::new_v4();
        assert!(matches!(
            lifecycle.open_stream(id).await.unwrap_err(),
            BrainError::NotFound(_)
        ));

        source.insert(id, egg());
        source.kill(id);
        assert!(matches!(
            lifecycle.open_stream(id).await.unwrap_err(),
            BrainError::NotAlive(_)
        ));
        assert!(!lifecycle.manager().has_brain(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_is_reported_not_fatal() {
        let manager = SimulationManager::new(BrainConfig::default()).unwrap();
        let lifecycle = BrainLifecycle::new(
            manager,
            Arc::new(FailingSource),
            &LifecycleConfig {
                poll_interval_ms: POLL_MS,
            },
        );
        let id = Uuid::new_v4();

        let err = lifecycle.refresh(id).await.unwrap_err();
        assert!(matches!(err, BrainError::Source { .. }));
        assert!(err.to_string().contains("query gateway unavailable"));

        // neither path panics or stops the poller
        lifecycle.on_pet_evolved(id).await;
        lifecycle.on_pet_created(id);
        tokio::time::sleep(Duration::from_millis(POLL_MS * 2 + 100)).await;
        assert_eq!(lifecycle.tracked_pets(), 1);
        lifecycle.shutdown();
        assert_eq!(lifecycle.tracked_pets(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vanished_pet_stops_polling() {
        let (lifecycle, source) = setup();
        let id = Uuid::new_v4();
        source.insert(id, egg());
        lifecycle.on_pet_created(id);
        source.remove(id);

        tokio::time::sleep(Duration::from_millis(POLL_MS + 100)).await;
        assert!(!lock(&lifecycle.pollers).contains_key(&id));
        assert_eq!(lifecycle.tracked_pets(), 0);

        // the pet comes back: a fresh poller is tracked again
        source.insert(id, egg());
        lifecycle.on_pet_created(id);
        tokio::time::sleep(Duration::from_millis(POLL_MS + 100)).await;
        assert_eq!(lifecycle.tracked_pets(), 1);
        lifecycle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_poller_entry_survives_old_poller_exit() {
        let (lifecycle, source) = setup();
        let id = Uuid::new_v4();
        source.insert(id, egg());
        lifecycle.on_pet_created(id);
        lifecycle.on_pet_created(id);
        let current = lock(&lifecycle.pollers).get(&id).map(|p| p.seq);
        assert_eq!(current, Some(1));

        tokio::time::sleep(Duration::from_millis(POLL_MS * 2 + 100)).await;
        assert_eq!(lock(&lifecycle.pollers).get(&id).map(|p| p.seq), current);
        assert_eq!(lifecycle.tracked_pets(), 1);
        lifecycle.shutdown();
        assert!(lock(&lifecycle.pollers).is_empty());
    }
}
