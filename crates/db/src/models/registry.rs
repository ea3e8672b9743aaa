//! Registry and registration row models.

use herdbook_core::animal;
use herdbook_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `registries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Registry {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}

impl From<Registry> for animal::Registry {
    fn from(row: Registry) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

/// A row from the `animal_registrations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnimalRegistration {
    pub id: DbId,
    pub animal_id: DbId,
    pub registry_id: DbId,
    pub identifier: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
