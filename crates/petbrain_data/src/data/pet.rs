use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PetStage {
    Egg,
    Baby,
    Teen,
    Adult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionPath {
    Healthy,
    Neglected,
    Undetermined,
}

/// Pet attributes consumed from the game-state side.
///
/// `hunger`, `happiness` and `health` are expected in `0..=100`; callers own
/// that precondition. Young pets may not have a stage or path yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetVitals {
    pub hunger: u32,
    pub happiness: u32,
    pub health: u32,
    pub stage: Option<PetStage>,
    pub evolution_path: Option<EvolutionPath>,
}

impl PetVitals {
    #[must_use]
    pub fn new(
        hunger: u32,
        happiness: u32,
        health: u32,
        stage: PetStage,
        evolution_path: EvolutionPath,
    ) -> Self {
        Self {
            hunger,
            happiness,
            health,
            stage: Some(stage),
            evolution_path: Some(evolution_path),
        }
    }
}

impl Default for PetVitals {
    fn default() -> Self {
        Self {
            hunger: 0,
            happiness: 50,
            health: 100,
            stage: Some(PetStage::Egg),
            evolution_path: None,
        }
    }
}

/// Answer of the game-state side to a status query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetStatus {
    pub vitals: PetVitals,
    pub alive: bool,
}

/// Per-pet simulation tunables derived from [`PetVitals`].
///
/// Never edited in place: a recomputed value replaces the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub firing_threshold: f64,
    pub decay_factor: f64,
    pub input_leakage: f64,
    pub base_activity: f64,
    pub grid_size: usize,
    pub tick_interval_ms: u64,
    pub burst_threshold_multiplier: f64,
}

impl SimulationParameters {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
