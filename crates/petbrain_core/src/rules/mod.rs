//! Per-tick, per-cell transition function.
//!
//! A cell's input is the sum of its neighbors' previous activations, each
//! scaled by the synaptic weight of the direction it arrives from and by the
//! neighbor's polarity. The input then drives the [`phase`] state machine
//! against a threshold adjusted for the cell's cortical layer.

pub mod phase;

use crate::cell::Cell;
use crate::config::SynapticWeights;
use petbrain_data::{CellState, CellType, CorticalLayer, Direction, SimulationParameters};
use phase::{Membrane, PhaseInput};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Summed neighbor input for one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborInput {
    pub total: f64,
    /// Direction of the single largest-magnitude contribution, if any was nonzero.
    pub dominant: Option<Direction>,
}

/// Stateless evaluator shared by every driver.
///
/// The only mutable piece is the global pause flag, shared through an
/// `Arc<AtomicBool>` so it can be flipped while drivers are running.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    weights: SynapticWeights,
    paused: Arc<AtomicBool>,
}

impl RuleEngine {
    #[must_use]
    pub fn new(weights: SynapticWeights, paused: bool) -> Self {
        Self {
            weights,
            paused: Arc::new(AtomicBool::new(paused)),
        }
    }

    #[must_use]
    pub fn weights(&self) -> &SynapticWeights {
        &self.weights
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Layer-adjusted threshold: easier-firing layers divide it down.
    #[must_use]
    pub fn effective_threshold(firing_threshold: f64, layer: CorticalLayer) -> f64 {
        firing_threshold / layer.firing_multiplier()
    }

    /// Weighted input arriving at `cell` from the current states in `cells`.
    #[must_use]
    pub fn neighbor_input(&self, cell: &Cell, cells: &[Cell]) -> NeighborInput {
        let mut total = 0.0;
        let mut dominant = None;
        let mut strongest = 0.0;

        for &idx in cell.neighbors() {
            let neighbor = &cells[idx];
            let Some(direction) = Direction::between(neighbor.position(), cell.position()) else {
                continue;
            };
            let contribution = neighbor.state().activation
                * self.weights.weight(direction)
                * neighbor.cell_type().polarity();
            total += contribution;
            if contribution.abs() > strongest {
                strongest = contribution.abs();
                dominant = Some(direction);
            }
        }

        NeighborInput { total, dominant }
    }

    /// Next state of `cell`, read only from the current states in `cells`.
    ///
    /// While paused the current state is returned unchanged.
    #[must_use]
    pub fn evaluate(
        &self,
        cell: &Cell,
        cells: &[Cell],
        params: &SimulationParameters,
    ) -> CellState {
        let current = cell.state();
        if self.is_paused() {
            return current.clone();
        }

        let input = self.neighbor_input(cell, cells);
        let threshold = Self::effective_threshold(params.firing_threshold, cell.layer());
        let drive = PhaseInput {
            input: input.total,
            threshold,
            burst_capable: cell.layer() == CorticalLayer::Layer5
                && cell.cell_type() == CellType::Excitatory,
            burst_threshold_multiplier: params.burst_threshold_multiplier,
            decay_factor: params.decay_factor,
            input_leakage: params.input_leakage,
        };

        let next = phase::advance(Membrane::from_state(current), &drive);
        if next.firing && !current.is_firing {
            tracing::trace!(
                cell = cell.id(),
                input = input.total,
                burst = next.burst_mode,
                "Cell fired"
            );
        }

        let now = chrono::Utc::now().timestamp_millis();
        CellState {
            cell_id: Arc::clone(&current.cell_id),
            x: current.x,
            y: current.y,
            activation: CellState::clamp_activation(next.activation),
            is_firing: next.firing,
            neuron_phase: next.phase,
            phase_countdown: next.countdown,
            burst_mode: next.burst_mode,
            burst_count: next.burst_count,
            accumulated_input: input.total,
            dominant_direction: input.dominant,
            layer: current.layer,
            cell_type: current.cell_type,
            timestamp: now,
            last_fired_at: if next.firing {
                now
            } else {
                current.last_fired_at
            },
        }
    }
}
