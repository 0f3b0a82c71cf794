use crate::model::state::{CellState, NeuronPhase};
use serde::Serialize;

/// Aggregate view of one streamed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Position of the batch in the stream; the full snapshot is 0.
    pub sequence: u64,
    pub cells: usize,
    pub firing: usize,
    pub bursting: usize,
    /// Cells in repolarization or hyperpolarization.
    pub refractory: usize,
    pub mean_activation: f64,
    pub max_activation: f64,
}

impl BatchSummary {
    #[must_use]
    pub fn from_batch(sequence: u64, batch: &[CellState]) -> Self {
        let mut summary = Self {
            sequence,
            cells: batch.len(),
            ..Self::default()
        };
        if batch.is_empty() {
            return summary;
        }

        let mut total = 0.0;
        let mut max = f64::MIN;
        for cell in batch {
            total += cell.activation;
            max = max.max(cell.activation);
            if cell.is_firing {
                summary.firing += 1;
            }
            if cell.burst_mode {
                summary.bursting += 1;
            }
            if matches!(
                cell.neuron_phase,
                NeuronPhase::Repolarizing | NeuronPhase::Hyperpolarized
            ) {
                summary.refractory += 1;
            }
        }
        summary.mean_activation = total / batch.len() as f64;
        summary.max_activation = max;
        summary
    }

    /// Share of the batch that fired, in `[0, 1]`.
    #[must_use]
    pub fn firing_ratio(&self) -> f64 {
        if self.cells == 0 {
            0.0
        } else {
            self.firing as f64 / self.cells as f64
        }
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{:<5} cells={:<4} firing={:<4} burst={:<4} refractory={:<4} mean={:+.3} max={:+.3}",
            self.sequence,
            self.cells,
            self.firing,
            self.bursting,
            self.refractory,
            self.mean_activation,
            self.max_activation
        )
    }
}
