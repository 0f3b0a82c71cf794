//! Plain data shared by every petbrain crate: neuron classifications, the
//! per-cell state record streamed to observers, and the pet vitals/parameter
//! structs exchanged with the game-state side.

pub mod data;

pub use data::cell::CellState;
pub use data::neuron::{CellType, CorticalLayer, Direction, NeuronPhase};
pub use data::pet::{EvolutionPath, PetStage, PetStatus, PetVitals, SimulationParameters};
pub use uuid::Uuid;

/// Identifier of the entity (pet) a brain belongs to.
pub type PetId = Uuid;
