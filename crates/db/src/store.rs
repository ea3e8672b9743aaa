//! Postgres-backed [`ImportStore`].
//!
//! Preview reads through a pooled connection; execute opens one database
//! transaction per row. Both are scoped to the tenant the store was built
//! for.

use async_trait::async_trait;
use chrono::NaiveDate;
use herdbook_core::animal::{AnimalRecord, AnimalUpdate, NewAnimal, Registry, Sex, Species};
use herdbook_core::error::CoreError;
use herdbook_core::import::store::{AnimalLookup, ImportStore, RowTransaction, StoreError};
use herdbook_core::types::DbId;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres, Transaction};

use crate::models::animal::Animal;
use crate::repositories::{AnimalRepo, RegistryRepo};
use crate::DbPool;

/// Classify a database error. Connection-level failures abort the import;
/// everything else fails only the current row.
fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        other => StoreError::Operation(other.to_string()),
    }
}

fn conversion_error(err: CoreError) -> StoreError {
    StoreError::Operation(err.to_string())
}

fn into_records(rows: Vec<Animal>) -> Result<Vec<AnimalRecord>, StoreError> {
    rows.into_iter()
        .map(|row| row.into_record().map_err(conversion_error))
        .collect()
}

fn into_record(row: Option<Animal>) -> Result<Option<AnimalRecord>, StoreError> {
    row.map(|row| row.into_record().map_err(conversion_error))
        .transpose()
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Import store for a single tenant.
#[derive(Debug, Clone)]
pub struct PgImportStore {
    pool: DbPool,
    tenant_id: DbId,
}

impl PgImportStore {
    pub fn new(pool: DbPool, tenant_id: DbId) -> Self {
        Self { pool, tenant_id }
    }
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn lookup(&self) -> Result<Box<dyn AnimalLookup>, StoreError> {
        let conn = self.pool.acquire().await.map_err(store_error)?;
        Ok(Box::new(PgLookup {
            conn,
            tenant_id: self.tenant_id,
        }))
    }

    async fn begin(&self) -> Result<Box<dyn RowTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(store_error)?;
        Ok(Box::new(PgRowTransaction {
            tx,
            tenant_id: self.tenant_id,
        }))
    }
}

// ---------------------------------------------------------------------------
// Shared reads
// ---------------------------------------------------------------------------

async fn find_by_identity(
    conn: &mut PgConnection,
    tenant_id: DbId,
    name: &str,
    species: Species,
    sex: Sex,
    birth_date: Option<NaiveDate>,
) -> Result<Vec<AnimalRecord>, StoreError> {
    let rows = AnimalRepo::find_by_identity(conn, tenant_id, name, species, sex, birth_date)
        .await
        .map_err(store_error)?;
    into_records(rows)
}

async fn find_by_microchip(
    conn: &mut PgConnection,
    tenant_id: DbId,
    microchip: &str,
) -> Result<Vec<AnimalRecord>, StoreError> {
    let rows = AnimalRepo::find_by_microchip(conn, tenant_id, microchip)
        .await
        .map_err(store_error)?;
    into_records(rows)
}

async fn list_by_species_and_sex(
    conn: &mut PgConnection,
    tenant_id: DbId,
    species: Species,
    sex: Sex,
) -> Result<Vec<AnimalRecord>, StoreError> {
    let rows = AnimalRepo::list_by_species_and_sex(conn, tenant_id, species, sex)
        .await
        .map_err(store_error)?;
    into_records(rows)
}

async fn find_by_id(
    conn: &mut PgConnection,
    tenant_id: DbId,
    id: DbId,
) -> Result<Option<AnimalRecord>, StoreError> {
    let row = AnimalRepo::find_by_id(conn, tenant_id, id)
        .await
        .map_err(store_error)?;
    into_record(row)
}

// ---------------------------------------------------------------------------
// Read-only handle
// ---------------------------------------------------------------------------

struct PgLookup {
    conn: PoolConnection<Postgres>,
    tenant_id: DbId,
}

#[async_trait]
impl AnimalLookup for PgLookup {
    async fn find_by_identity(
        &mut self,
        name: &str,
        species: Species,
        sex: Sex,
        birth_date: Option<NaiveDate>,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        find_by_identity(&mut self.conn, self.tenant_id, name, species, sex, birth_date).await
    }

    async fn find_by_microchip(
        &mut self,
        microchip: &str,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        find_by_microchip(&mut self.conn, self.tenant_id, microchip).await
    }

    async fn list_by_species_and_sex(
        &mut self,
        species: Species,
        sex: Sex,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        list_by_species_and_sex(&mut self.conn, self.tenant_id, species, sex).await
    }

    async fn find_by_id(&mut self, id: DbId) -> Result<Option<AnimalRecord>, StoreError> {
        find_by_id(&mut self.conn, self.tenant_id, id).await
    }
}

// ---------------------------------------------------------------------------
// Row transaction
// ---------------------------------------------------------------------------

/// Dropping without commit rolls the transaction back (sqlx semantics).
struct PgRowTransaction {
    tx: Transaction<'static, Postgres>,
    tenant_id: DbId,
}

#[async_trait]
impl AnimalLookup for PgRowTransaction {
    async fn find_by_identity(
        &mut self,
        name: &str,
        species: Species,
        sex: Sex,
        birth_date: Option<NaiveDate>,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        find_by_identity(&mut self.tx, self.tenant_id, name, species, sex, birth_date).await
    }

    async fn find_by_microchip(
        &mut self,
        microchip: &str,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        find_by_microchip(&mut self.tx, self.tenant_id, microchip).await
    }

    async fn list_by_species_and_sex(
        &mut self,
        species: Species,
        sex: Sex,
    ) -> Result<Vec<AnimalRecord>, StoreError> {
        list_by_species_and_sex(&mut self.tx, self.tenant_id, species, sex).await
    }

    async fn find_by_id(&mut self, id: DbId) -> Result<Option<AnimalRecord>, StoreError> {
        find_by_id(&mut self.tx, self.tenant_id, id).await
    }
}

#[async_trait]
impl RowTransaction for PgRowTransaction {
    async fn insert_animal(&mut self, animal: &NewAnimal) -> Result<AnimalRecord, StoreError> {
        let row = AnimalRepo::create(&mut self.tx, self.tenant_id, animal)
            .await
            .map_err(store_error)?;
        row.into_record().map_err(conversion_error)
    }

    async fn update_animal(
        &mut self,
        id: DbId,
        update: &AnimalUpdate,
    ) -> Result<AnimalRecord, StoreError> {
        let row = AnimalRepo::update(&mut self.tx, self.tenant_id, id, update)
            .await
            .map_err(store_error)?
            .ok_or_else(|| StoreError::Operation(format!("animal {id} does not exist")))?;
        row.into_record().map_err(conversion_error)
    }

    async fn find_or_create_registry(&mut self, name: &str) -> Result<Registry, StoreError> {
        let row = RegistryRepo::find_or_create(&mut self.tx, self.tenant_id, name)
            .await
            .map_err(store_error)?;
        Ok(row.into())
    }

    async fn link_registry(
        &mut self,
        animal_id: DbId,
        registry_id: DbId,
        identifier: &str,
    ) -> Result<(), StoreError> {
        RegistryRepo::upsert_registration(&mut self.tx, animal_id, registry_id, identifier)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.commit().await.map_err(store_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.tx.rollback().await.map_err(store_error)
    }
}
