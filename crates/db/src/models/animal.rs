//! Animal row model.

use chrono::NaiveDate;
use herdbook_core::animal::AnimalRecord;
use herdbook_core::error::CoreError;
use herdbook_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `animals` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Animal {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub species: String,
    pub sex: String,
    pub birth_date: Option<NaiveDate>,
    pub microchip: Option<String>,
    pub breed: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub dam_id: Option<DbId>,
    pub sire_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Animal {
    /// Convert to the core record. Fails only if a vocabulary column holds a
    /// value the CHECK constraints should have rejected.
    pub fn into_record(self) -> Result<AnimalRecord, CoreError> {
        Ok(AnimalRecord {
            id: self.id,
            species: self.species.parse()?,
            sex: self.sex.parse()?,
            status: self.status.parse()?,
            name: self.name,
            birth_date: self.birth_date,
            microchip: self.microchip,
            breed: self.breed,
            notes: self.notes,
            dam_id: self.dam_id,
            sire_id: self.sire_id,
        })
    }
}
