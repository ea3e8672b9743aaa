//! In-memory [`ImportStore`] for tests and local tooling.
//!
//! A transaction takes the store's lock for its whole lifetime and works on a
//! private copy of the state, which replaces the shared state on commit.
//! Transactions are therefore serialized, and a dropped or rolled-back
//! transaction leaves no trace.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::store::{AnimalLookup, ImportStore, RowTransaction, StoreError};
use crate::animal::{
    AnimalRecord, AnimalUpdate, NewAnimal, Registration, Registry, Sex, Species,
};
use crate::types::DbId;

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub animals: BTreeMap<DbId, AnimalRecord>,
    pub registries: BTreeMap<DbId, Registry>,
    pub registrations: Vec<Registration>,
    next_id: DbId,
    /// Registry names whose links fail, to exercise row rollback.
    failing_registries: Vec<String>,
    /// Registry names whose links report the store as gone.
    unreachable_registries: Vec<String>,
}

impl MemoryState {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn find_by_identity(
        &self,
        name: &str,
        species: Species,
        sex: Sex,
        birth_date: Option<NaiveDate>,
    ) -> Vec<AnimalRecord> {
        let name = name.to_lowercase();
        self.animals
            .values()
            .filter(|a| {
                a.name.to_lowercase() == name
                    && a.species == species
                    && a.sex == sex
                    && a.birth_date == birth_date
            })
            .cloned()
            .collect()
    }

    fn find_by_microchip(&self, microchip: &str) -> Vec<AnimalRecord> {
        self.animals
            .values()
            .filter(|a| a.microchip.as_deref() == Some(microchip))
            .cloned()
            .collect()
    }

    fn list_by_species_and_sex(&self, species: Species, sex: Sex) -> Vec<AnimalRecord> {
        self.animals
            .values()
            .filter(|a| a.species == species && a.sex == sex)
            .cloned()
            .collect()
    }
}

/// Shared in-memory record store for a single tenant.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    begin_failures: Arc<Mutex<VecDeque<StoreError>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing any transaction.
    pub async fn seed(&self, animal: NewAnimal) -> AnimalRecord {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let record = record_from(id, &animal);
        state.animals.insert(id, record.clone());
        record
    }

    /// Make every registry link for `registry_name` fail.
    pub async fn fail_registry_links(&self, registry_name: &str) {
        self.state
            .lock()
            .await
            .failing_registries
            .push(registry_name.to_string());
    }

    /// Make every registry link for `registry_name` fail as if the store
    /// went away.
    pub async fn lose_store_on_registry_links(&self, registry_name: &str) {
        self.state
            .lock()
            .await
            .unreachable_registries
            .push(registry_name.to_string());
    }

    /// Fail the next [`ImportStore::begin`] call with `err`.
    pub async fn fail_next_begin(&self, err: StoreError) {
        self.begin_failures.lock().await.push_back(err);
    }

    /// Copy of the current committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn animals(&self) -> Vec<AnimalRecord> {
        self.state.lock().await.animals.values().cloned().collect()
    }
}

fn record_from(id: DbId, animal: &NewAnimal) -> AnimalRecord {
    AnimalRecord {
        id,
        name: animal.name.clone(),
        species: animal.species,
        sex: animal.sex,
        birth_date: animal.birth_date,
        microchip: animal.microchip.clone(),
        breed: animal.breed.clone(),
        status: animal.status,
        notes: animal.notes.clone(),
        dam_id: animal.dam_id,
        sire_id: animal.sire_id,
    }
}

#[async_trait]
impl ImportStore for MemoryStore {
    async fn lookup(&self) -> Result<Box<dyn AnimalLookup>, StoreError> {
        let state = self.state.lock().await.clone();
        Ok(Box::new(MemorySnapshot { state }))
    }

    async fn begin(&self) -> Result<Box<dyn RowTransaction>, StoreError> {
        if let Some(err) = self.begin_failures.lock().await.pop_front() {
            return Err(err);
        }
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

/// Read-only view used by preview.
struct MemorySnapshot {
    state: MemoryState,
}

#[async_trait]
impl AnimalLookup for MemorySnapshot {
    async fn find_by_identity(
        &mut self,
        name: &str,
        species: Species,
        sex: Sex,
        birth_date: Option<NaiveDate>,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        Ok(self.state.find_by_identity(name, species, sex, birth_date))
    }

    async fn find_by_microchip(
        &mut self,
        microchip: &str,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        Ok(self.state.find_by_microchip(microchip))
    }

    async fn list_by_species_and_sex(
        &mut self,
        species: Species,
        sex: Sex,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        Ok(self.state.list_by_species_and_sex(species, sex))
    }

    async fn find_by_id(&mut self, id: DbId) -> Result<Option<AnimalRecord>, StoreError> {
        Ok(self.state.animals.get(&id).cloned())
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl AnimalLookup for MemoryTransaction {
    async fn find_by_identity(
        &mut self,
        name: &str,
        species: Species,
        sex: Sex,
        birth_date: Option<NaiveDate>,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        Ok(self.working.find_by_identity(name, species, sex, birth_date))
    }

    async fn find_by_microchip(
        &mut self,
        microchip: &str,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        Ok(self.working.find_by_microchip(microchip))
    }

    async fn list_by_species_and_sex(
        &mut self,
        species: Species,
        sex: Sex,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        Ok(self.working.list_by_species_and_sex(species, sex))
    }

    async fn find_by_id(&mut self, id: DbId) -> Result<Option<AnimalRecord>, StoreError> {
        Ok(self.working.animals.get(&id).cloned())
    }
}

#[async_trait]
impl RowTransaction for MemoryTransaction {
    async fn insert_animal(&mut self, animal: &NewAnimal) -> Result<AnimalRecord, StoreError> {
        let id = self.working.next_id();
        let record = record_from(id, animal);
        self.working.animals.insert(id, record.clone());
        Ok(record)
    }

    async fn update_animal(
        &mut self,
        id: DbId,
        update: &AnimalUpdate,
    ) -> Result<AnimalRecord, StoreError> {
        let record = self
            .working
            .animals
            .get_mut(&id)
            .ok_or_else(|| StoreError::Operation(format!("animal {id} does not exist")))?;
        record.apply(update);
        Ok(record.clone())
    }

    async fn find_or_create_registry(&mut self, name: &str) -> Result<Registry, StoreError> {
        if let Some(existing) = self.working.registries.values().find(|r| r.name == name) {
            return Ok(existing.clone());
        }
        let registry = Registry {
            id: self.working.next_id(),
            name: name.to_string(),
        };
        self.working
            .registries
            .insert(registry.id, registry.clone());
        Ok(registry)
    }

    async fn link_registry(
        &mut self,
        animal_id: DbId,
        registry_id: DbId,
        identifier: &str,
    ) -> Result<(), StoreError> {
        let registry_name = self
            .working
            .registries
            .get(&registry_id)
            .map(|r| r.name.clone())
            .ok_or_else(|| StoreError::Operation(format!("registry {registry_id} does not exist")))?;
        if self.working.unreachable_registries.contains(&registry_name) {
            return Err(StoreError::Unavailable(format!(
                "connection lost while linking registry '{registry_name}'"
            )));
        }
        if self.working.failing_registries.contains(&registry_name) {
            return Err(StoreError::Operation(format!(
                "registry '{registry_name}' rejected the link"
            )));
        }

        match self
            .working
            .registrations
            .iter_mut()
            .find(|r| r.animal_id == animal_id && r.registry_id == registry_id)
        {
            Some(existing) => existing.identifier = identifier.to_string(),
            None => self.working.registrations.push(Registration {
                animal_id,
                registry_id,
                identifier: identifier.to_string(),
            }),
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animal::AnimalStatus;

    fn new_animal(name: &str) -> NewAnimal {
        NewAnimal {
            name: name.into(),
            species: Species::Dog,
            sex: Sex::Female,
            birth_date: None,
            microchip: None,
            breed: None,
            status: AnimalStatus::Active,
            notes: None,
            dam_id: None,
            sire_id: None,
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_animal(&new_animal("Bella")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.animals().await.len(), 1);
    }

    #[tokio::test]
    async fn rolled_back_writes_vanish() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_animal(&new_animal("Bella")).await.unwrap();
        let registry = tx.find_or_create_registry("AKC").await.unwrap();
        tx.link_registry(1, registry.id, "X1").await.unwrap();
        tx.rollback().await.unwrap();

        let state = store.snapshot().await;
        assert!(state.animals.is_empty());
        assert!(state.registries.is_empty());
        assert!(state.registrations.is_empty());
    }

    #[tokio::test]
    async fn transaction_reads_its_own_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_animal(&new_animal("Bella")).await.unwrap();
        let found = tx
            .find_by_identity("BELLA", Species::Dog, Sex::Female, None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn registry_find_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx.find_or_create_registry("AKC").await.unwrap();
        let second = tx.find_or_create_registry("AKC").await.unwrap();
        assert_eq!(first, second);

        tx.link_registry(5, first.id, "A-1").await.unwrap();
        tx.link_registry(5, first.id, "A-2").await.unwrap();
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.registries.len(), 1);
        assert_eq!(state.registrations.len(), 1);
        assert_eq!(state.registrations[0].identifier, "A-2");
    }
}
