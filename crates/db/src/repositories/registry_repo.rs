//! Repository for the `registries` and `animal_registrations` tables.

use herdbook_core::types::DbId;
use sqlx::PgConnection;

use crate::models::registry::{AnimalRegistration, Registry};

const REGISTRY_COLUMNS: &str = "id, tenant_id, name, created_at";

const REGISTRATION_COLUMNS: &str =
    "id, animal_id, registry_id, identifier, created_at, updated_at";

pub struct RegistryRepo;

impl RegistryRepo {
    /// Return the tenant's registry with this name, creating it if absent.
    ///
    /// Uses an upsert on `(tenant_id, name)` so concurrent imports naming the
    /// same new registry end up with a single row.
    pub async fn find_or_create(
        conn: &mut PgConnection,
        tenant_id: DbId,
        name: &str,
    ) -> Result<Registry, sqlx::Error> {
        let query = format!(
            "INSERT INTO registries (tenant_id, name) VALUES ($1, $2) \
             ON CONFLICT (tenant_id, name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING {REGISTRY_COLUMNS}"
        );
        sqlx::query_as::<_, Registry>(&query)
            .bind(tenant_id)
            .bind(name)
            .fetch_one(conn)
            .await
    }

    /// Link an animal to a registry, replacing the identifier of an
    /// existing link for the same pair.
    pub async fn upsert_registration(
        conn: &mut PgConnection,
        animal_id: DbId,
        registry_id: DbId,
        identifier: &str,
    ) -> Result<AnimalRegistration, sqlx::Error> {
        let query = format!(
            "INSERT INTO animal_registrations (animal_id, registry_id, identifier) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (animal_id, registry_id) \
             DO UPDATE SET identifier = EXCLUDED.identifier, updated_at = NOW() \
             RETURNING {REGISTRATION_COLUMNS}"
        );
        sqlx::query_as::<_, AnimalRegistration>(&query)
            .bind(animal_id)
            .bind(registry_id)
            .bind(identifier)
            .fetch_one(conn)
            .await
    }

    /// All registrations of one animal, oldest first.
    pub async fn list_registrations(
        conn: &mut PgConnection,
        animal_id: DbId,
    ) -> Result<Vec<AnimalRegistration>, sqlx::Error> {
        let query = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM animal_registrations \
             WHERE animal_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, AnimalRegistration>(&query)
            .bind(animal_id)
            .fetch_all(conn)
            .await
    }
}
