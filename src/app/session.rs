use super::summary::BatchSummary;
use crate::model::config::BrainConfig;
use crate::model::engine::{BrainLifecycle, InMemoryVitals, SimulationManager};
use crate::model::state::{CellState, PetStage, PetVitals};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A single pet wired to its own manager and in-memory vitals.
#[derive(Debug)]
pub struct Session {
    pet_id: Uuid,
    vitals: InMemoryVitals,
    lifecycle: BrainLifecycle,
}

impl Session {
    /// Registers the pet and starts vitals polling. No driver runs until
    /// [`Session::watch`] subscribes.
    pub fn start(config: BrainConfig, vitals: PetVitals) -> Result<Self> {
        let lifecycle_config = config.lifecycle.clone();
        let manager =
            SimulationManager::new(config).context("Failed to create simulation manager")?;
        let source = InMemoryVitals::new();
        let pet_id = Uuid::new_v4();
        source.insert(pet_id, vitals);

        let lifecycle = BrainLifecycle::new(manager, Arc::new(source.clone()), &lifecycle_config);
        lifecycle.on_pet_created(pet_id);
        tracing::info!(pet_id = %pet_id, "Session started");

        Ok(Self {
            pet_id,
            vitals: source,
            lifecycle,
        })
    }

    #[must_use]
    pub fn pet_id(&self) -> Uuid {
        self.pet_id
    }

    #[must_use]
    pub fn lifecycle(&self) -> &BrainLifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn vitals(&self) -> &InMemoryVitals {
        &self.vitals
    }

    /// Streams the brain for `duration`, handing every batch to `on_batch`.
    ///
    /// Returns the number of batches seen. Ends early if the brain stops.
    pub async fn watch<F>(&self, duration: Duration, mut on_batch: F) -> Result<u64>
    where
        F: FnMut(&[CellState], &BatchSummary) -> Result<()>,
    {
        let mut subscription = self.lifecycle.open_stream(self.pet_id).await?;
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        let mut sequence = 0;
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                batch = subscription.next_batch() => match batch {
                    Some(batch) => {
                        let summary = BatchSummary::from_batch(sequence, &batch);
                        on_batch(&batch, &summary)?;
                        sequence += 1;
                    }
                    None => {
                        tracing::info!(pet_id = %self.pet_id, "Brain stream ended");
                        break;
                    }
                },
            }
        }
        Ok(sequence)
    }

    /// Moves the pet to `stage` and lets the lifecycle resize its brain.
    pub async fn evolve(&self, stage: PetStage) -> Result<()> {
        let mut vitals = self
            .vitals
            .get(self.pet_id)
            .context("Pet missing from vitals table")?
            .vitals;
        vitals.stage = Some(stage);
        self.vitals.set_vitals(self.pet_id, vitals);
        self.lifecycle.on_pet_evolved(self.pet_id).await;
        Ok(())
    }

    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
        self.lifecycle.manager().shutdown();
        tracing::info!(
            pet_id = %self.pet_id,
            ticks = self.lifecycle.manager().metrics().tick_count(),
            "Session finished"
        );
    }
}
