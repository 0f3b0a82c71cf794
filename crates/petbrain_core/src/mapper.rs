//! Pure mapping from pet vitals to simulation tunables.
//!
//! Hungry pets fire more easily, happy pets leak more input into the
//! membrane, healthy pets decay more slowly, and neglected pets burst on
//! weaker input. Stage picks the grid size and tick rate.

use petbrain_data::{EvolutionPath, PetStage, PetVitals, SimulationParameters};

/// Threshold of a pet that is not hungry at all.
pub const BASE_FIRING_THRESHOLD: f64 = 2.5;
/// How far full hunger lowers the threshold.
pub const HUNGER_THRESHOLD_DROP: f64 = 1.5;
pub const BASE_INPUT_LEAKAGE: f64 = 0.05;
pub const HAPPINESS_LEAKAGE_GAIN: f64 = 0.1;
pub const BASE_DECAY_FACTOR: f64 = 0.85;
pub const HEALTH_DECAY_GAIN: f64 = 0.1;
pub const NEGLECTED_BURST_MULTIPLIER: f64 = 1.8;
pub const DEFAULT_BURST_MULTIPLIER: f64 = 2.5;

/// Grid edge and tick interval (ms) for a stage.
#[must_use]
pub fn stage_geometry(stage: PetStage) -> (usize, u64) {
    match stage {
        PetStage::Egg => (20, 150),
        PetStage::Baby => (35, 120),
        PetStage::Teen => (50, 100),
        PetStage::Adult => (100, 80),
    }
}

/// Derives the parameters for one pet.
///
/// Vitals are expected in `0..=100`; values outside that range are the
/// caller's problem and are not clamped. A missing stage maps like an egg.
#[must_use]
pub fn map_parameters(vitals: &PetVitals) -> SimulationParameters {
    let hunger = f64::from(vitals.hunger) / 100.0;
    let happiness = f64::from(vitals.happiness) / 100.0;
    let base_activity = f64::from(vitals.health) / 100.0;

    let burst_threshold_multiplier = match vitals.evolution_path {
        Some(EvolutionPath::Neglected) => NEGLECTED_BURST_MULTIPLIER,
        _ => DEFAULT_BURST_MULTIPLIER,
    };
    let (grid_size, tick_interval_ms) = stage_geometry(vitals.stage.unwrap_or(PetStage::Egg));

    SimulationParameters {
        firing_threshold: BASE_FIRING_THRESHOLD - hunger * HUNGER_THRESHOLD_DROP,
        decay_factor: BASE_DECAY_FACTOR + base_activity * HEALTH_DECAY_GAIN,
        input_leakage: BASE_INPUT_LEAKAGE + happiness * HAPPINESS_LEAKAGE_GAIN,
        base_activity,
        grid_size,
        tick_interval_ms,
        burst_threshold_multiplier,
    }
}
