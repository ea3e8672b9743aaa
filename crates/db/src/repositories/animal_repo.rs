//! Repository for the `animals` table.

use chrono::NaiveDate;
use herdbook_core::animal::{AnimalUpdate, NewAnimal, Sex, Species};
use herdbook_core::types::DbId;
use sqlx::PgConnection;

use crate::models::animal::Animal;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, tenant_id, name, species, sex, birth_date, microchip, breed, status, \
                       notes, dam_id, sire_id, created_at, updated_at";

/// Provides tenant-scoped reads and writes for animal records.
pub struct AnimalRepo;

impl AnimalRepo {
    /// Insert a new animal, returning the created row.
    pub async fn create(
        conn: &mut PgConnection,
        tenant_id: DbId,
        input: &NewAnimal,
    ) -> Result<Animal, sqlx::Error> {
        let query = format!(
            "INSERT INTO animals
                (tenant_id, name, species, sex, birth_date, microchip, breed, status, notes,
                 dam_id, sire_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Animal>(&query)
            .bind(tenant_id)
            .bind(&input.name)
            .bind(input.species.as_str())
            .bind(input.sex.as_str())
            .bind(input.birth_date)
            .bind(&input.microchip)
            .bind(&input.breed)
            .bind(input.status.as_str())
            .bind(&input.notes)
            .bind(input.dam_id)
            .bind(input.sire_id)
            .fetch_one(conn)
            .await
    }

    /// Update an animal. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists for the tenant.
    pub async fn update(
        conn: &mut PgConnection,
        tenant_id: DbId,
        id: DbId,
        input: &AnimalUpdate,
    ) -> Result<Option<Animal>, sqlx::Error> {
        let query = format!(
            "UPDATE animals SET
                birth_date = COALESCE($3, birth_date),
                microchip = COALESCE($4, microchip),
                breed = COALESCE($5, breed),
                status = COALESCE($6, status),
                notes = COALESCE($7, notes),
                dam_id = COALESCE($8, dam_id),
                sire_id = COALESCE($9, sire_id),
                updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Animal>(&query)
            .bind(id)
            .bind(tenant_id)
            .bind(input.birth_date)
            .bind(&input.microchip)
            .bind(&input.breed)
            .bind(input.status.map(|s| s.as_str()))
            .bind(&input.notes)
            .bind(input.dam_id)
            .bind(input.sire_id)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        tenant_id: DbId,
        id: DbId,
    ) -> Result<Option<Animal>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM animals WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, Animal>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(conn)
            .await
    }

    /// Records matching name (case-insensitive), species, sex and birth date.
    /// A missing birth date matches only records without one.
    pub async fn find_by_identity(
        conn: &mut PgConnection,
        tenant_id: DbId,
        name: &str,
        species: Species,
        sex: Sex,
        birth_date: Option<NaiveDate>,
    ) -> Result<Vec<Animal>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM animals
             WHERE tenant_id = $1
               AND lower(name) = lower($2)
               AND species = $3
               AND sex = $4
               AND birth_date IS NOT DISTINCT FROM $5
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, Animal>(&query)
            .bind(tenant_id)
            .bind(name)
            .bind(species.as_str())
            .bind(sex.as_str())
            .bind(birth_date)
            .fetch_all(conn)
            .await
    }

    pub async fn find_by_microchip(
        conn: &mut PgConnection,
        tenant_id: DbId,
        microchip: &str,
    ) -> Result<Vec<Animal>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM animals
             WHERE tenant_id = $1 AND microchip = $2
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, Animal>(&query)
            .bind(tenant_id)
            .bind(microchip)
            .fetch_all(conn)
            .await
    }

    /// All records of one species and sex, the candidate pool for parents.
    pub async fn list_by_species_and_sex(
        conn: &mut PgConnection,
        tenant_id: DbId,
        species: Species,
        sex: Sex,
    ) -> Result<Vec<Animal>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM animals
             WHERE tenant_id = $1 AND species = $2 AND sex = $3
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, Animal>(&query)
            .bind(tenant_id)
            .bind(species.as_str())
            .bind(sex.as_str())
            .fetch_all(conn)
            .await
    }
}
