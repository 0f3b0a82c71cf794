//! Error types for the brain runtime.
//!
//! The tick path never fails; these errors only surface at the edges where a
//! caller asks about a pet the game-state side does not know or has buried.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BrainError {
    /// The vitals source has no record of the pet
    #[error("Pet not found: {0}")]
    NotFound(Uuid),

    /// The pet exists but is dead, so there is no brain to stream
    #[error("Pet is dead: {0}")]
    NotAlive(Uuid),

    /// The vitals source failed to answer
    #[error("Vitals source error for {id}: {message}")]
    Source { id: Uuid, message: String },

    /// Invalid runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BrainError>;

impl BrainError {
    #[must_use]
    pub fn source_failure(id: Uuid, err: &anyhow::Error) -> Self {
        Self::Source {
            id,
            message: format!("{err:#}"),
        }
    }

    #[must_use]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error means the pet cannot have a brain right now, as
    /// opposed to a transient failure.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotAlive(_))
    }
}
