use super::neuron::{CellType, CorticalLayer, Direction, NeuronPhase};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lower bound of a cell's activation (hyperpolarized undershoot).
pub const MIN_ACTIVATION: f64 = -0.1;
/// Upper bound of a cell's activation (spike peak).
pub const MAX_ACTIVATION: f64 = 1.0;

/// Full state of one cell after a tick.
///
/// A value is always replaced wholesale; nothing mutates a published state.
/// Field names serialize in camelCase to match the observer record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellState {
    pub cell_id: Arc<str>,
    pub x: u32,
    pub y: u32,
    /// Clamped to `[MIN_ACTIVATION, MAX_ACTIVATION]`.
    pub activation: f64,
    pub is_firing: bool,
    pub neuron_phase: NeuronPhase,
    pub phase_countdown: u32,
    pub burst_mode: bool,
    /// Spikes left in the current burst; zero outside burst mode.
    pub burst_count: u32,
    /// Weighted neighbor input summed during the tick that produced this state.
    pub accumulated_input: f64,
    pub dominant_direction: Option<Direction>,
    pub layer: CorticalLayer,
    pub cell_type: CellType,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub last_fired_at: i64,
}

impl CellState {
    /// Quiescent state a freshly built cell starts in.
    #[must_use]
    pub fn resting(
        cell_id: Arc<str>,
        x: u32,
        y: u32,
        layer: CorticalLayer,
        cell_type: CellType,
        now_ms: i64,
    ) -> Self {
        Self {
            cell_id,
            x,
            y,
            activation: 0.0,
            is_firing: false,
            neuron_phase: NeuronPhase::Resting,
            phase_countdown: 0,
            burst_mode: false,
            burst_count: 0,
            accumulated_input: 0.0,
            dominant_direction: None,
            layer,
            cell_type,
            timestamp: now_ms,
            last_fired_at: 0,
        }
    }

    #[must_use]
    pub fn clamp_activation(value: f64) -> f64 {
        value.clamp(MIN_ACTIVATION, MAX_ACTIVATION)
    }
}
