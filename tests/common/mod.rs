pub mod macros;

use petbrain_lib::model::config::BrainConfig;
use petbrain_lib::model::engine::{BrainLifecycle, InMemoryVitals, SimulationManager};
use petbrain_lib::model::state::{EvolutionPath, PetStage, PetVitals};
use std::sync::Arc;

#[allow(dead_code)]
pub struct ManagerBuilder {
    config: BrainConfig,
}

#[allow(dead_code)]
impl ManagerBuilder {
    pub fn new() -> Self {
        let mut config = BrainConfig::default();
        config.simulation.shutdown_grace_period_ms = 1_000;
        Self { config }
    }

    pub fn with_grace_ms(mut self, ms: u64) -> Self {
        self.config.simulation.shutdown_grace_period_ms = ms;
        self
    }

    pub fn with_batch_window_ms(mut self, ms: u64) -> Self {
        self.config.simulation.batch_window_ms = ms;
        self
    }

    pub fn with_poll_ms(mut self, ms: u64) -> Self {
        self.config.lifecycle.poll_interval_ms = ms;
        self
    }

    pub fn paused(mut self) -> Self {
        self.config.simulation.paused = true;
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut BrainConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn build(self) -> SimulationManager {
        SimulationManager::new(self.config).expect("Failed to create manager")
    }

    /// Manager plus a lifecycle polling a fresh in-memory vitals table.
    pub fn build_lifecycle(self) -> (BrainLifecycle, InMemoryVitals) {
        let lifecycle_config = self.config.lifecycle.clone();
        let manager = self.build();
        let source = InMemoryVitals::new();
        let lifecycle = BrainLifecycle::new(manager, Arc::new(source.clone()), &lifecycle_config);
        (lifecycle, source)
    }
}

#[allow(dead_code)]
pub fn healthy(stage: PetStage) -> PetVitals {
    PetVitals::new(40, 60, 90, stage, EvolutionPath::Healthy)
}

#[allow(dead_code)]
pub fn neglected(stage: PetStage) -> PetVitals {
    PetVitals::new(90, 10, 30, stage, EvolutionPath::Neglected)
}
