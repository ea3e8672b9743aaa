//! Record-store capabilities consumed by the import pipeline.
//!
//! The pipeline never talks to a database directly. Preview reads through an
//! [`AnimalLookup`] handle; execute opens one [`RowTransaction`] per row so
//! that a row's writes either all commit or all roll back. Implementations
//! are scoped to a single tenant before they reach the core.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::animal::{AnimalRecord, AnimalUpdate, NewAnimal, Registry, Sex, Species};
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached at all. Aborts the whole import.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    /// A single operation failed (constraint violation, missing row, ...).
    /// Fails only the row being processed.
    #[error("Record store operation failed: {0}")]
    Operation(String),
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Read access to animal records.
#[async_trait]
pub trait AnimalLookup: Send {
    /// Records whose name equals `name` case-insensitively and whose species,
    /// sex and birth date (both absent counts as equal) match exactly.
    async fn find_by_identity(
        &mut self,
        name: &str,
        species: Species,
        sex: Sex,
        birth_date: Option<NaiveDate>,
    ) -> Result<Vec<AnimalRecord>, StoreError>;

    /// Records carrying exactly this microchip.
    async fn find_by_microchip(&mut self, microchip: &str)
        -> Result<Vec<AnimalRecord>, StoreError>;

    /// Candidate pool for parent matching.
    async fn list_by_species_and_sex(
        &mut self,
        species: Species,
        sex: Sex,
    ) -> Result<Vec<AnimalRecord>, StoreError>;

    async fn find_by_id(&mut self, id: DbId) -> Result<Option<AnimalRecord>, StoreError>;
}

/// A unit of work covering one import row.
///
/// Reads through the transaction observe its own uncommitted writes.
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait RowTransaction: AnimalLookup {
    async fn insert_animal(&mut self, animal: &NewAnimal) -> Result<AnimalRecord, StoreError>;

    async fn update_animal(
        &mut self,
        id: DbId,
        update: &AnimalUpdate,
    ) -> Result<AnimalRecord, StoreError>;

    /// Return the registry with this name, creating it if absent. Must not
    /// create two registries with the same name under concurrent use.
    async fn find_or_create_registry(&mut self, name: &str) -> Result<Registry, StoreError>;

    /// Link an animal to a registry. An existing link for the same pair has
    /// its identifier replaced.
    async fn link_registry(
        &mut self,
        animal_id: DbId,
        registry_id: DbId,
        identifier: &str,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Entry point handed to preview and execute.
#[async_trait]
pub trait ImportStore: Send + Sync {
    /// A read-only handle. Never writes.
    async fn lookup(&self) -> Result<Box<dyn AnimalLookup>, StoreError>;

    /// Open a transaction for one row.
    async fn begin(&self) -> Result<Box<dyn RowTransaction>, StoreError>;
}
