//! Boundary to the game-state side that owns pet vitals.

use async_trait::async_trait;
use petbrain_data::{PetStatus, PetVitals};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Answers status queries about pets.
///
/// `Ok(None)` means the pet is unknown; `Err` means the question could not
/// be answered right now.
#[async_trait]
pub trait VitalsSource: Send + Sync {
    async fn pet_status(&self, pet_id: Uuid) -> anyhow::Result<Option<PetStatus>>;
}

/// Vitals kept in process memory. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVitals {
    pets: Arc<RwLock<HashMap<Uuid, PetStatus>>>,
}

impl InMemoryVitals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a living pet, replacing any previous record.
    pub fn insert(&self, pet_id: Uuid, vitals: PetVitals) {
        let mut pets = self.pets.write().unwrap_or_else(|e| e.into_inner());
        pets.insert(
            pet_id,
            PetStatus {
                vitals,
                alive: true,
            },
        );
    }

    /// Replaces a known pet's vitals. Returns false for unknown pets.
    pub fn set_vitals(&self, pet_id: Uuid, vitals: PetVitals) -> bool {
        let mut pets = self.pets.write().unwrap_or_else(|e| e.into_inner());
        match pets.get_mut(&pet_id) {
            Some(status) => {
                status.vitals = vitals;
                true
            }
            None => false,
        }
    }

    /// Marks a known pet dead. Returns false for unknown pets.
    pub fn kill(&self, pet_id: Uuid) -> bool {
        let mut pets = self.pets.write().unwrap_or_else(|e| e.into_inner());
        match pets.get_mut(&pet_id) {
            Some(status) => {
                status.alive = false;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, pet_id: Uuid) -> Option<PetStatus> {
        let mut pets = self.pets.write().unwrap_or_else(|e| e.into_inner());
        pets.remove(&pet_id)
    }

    #[must_use]
    pub fn get(&self, pet_id: Uuid) -> Option<PetStatus> {
        let pets = self.pets.read().unwrap_or_else(|e| e.into_inner());
        pets.get(&pet_id).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pets.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VitalsSource for InMemoryVitals {
    async fn pet_status(&self, pet_id: Uuid) -> anyhow::Result<Option<PetStatus>> {
        Ok(self.get(pet_id))
    }
}
