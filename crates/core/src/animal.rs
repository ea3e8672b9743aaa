//! Animal record types and the closed vocabularies (species, sex, status)
//! shared by the import pipeline and the record store.
//!
//! Vocabulary parsing is case-insensitive; the canonical form is upper case,
//! which is also how values are stored and serialized.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Species
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Species {
    Dog,
    Cat,
    Horse,
    Goat,
    Rabbit,
    Sheep,
}

impl Species {
    pub const ALL: &'static [Species] = &[
        Self::Dog,
        Self::Cat,
        Self::Horse,
        Self::Goat,
        Self::Rabbit,
        Self::Sheep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dog => "DOG",
            Self::Cat => "CAT",
            Self::Horse => "HORSE",
            Self::Goat => "GOAT",
            Self::Rabbit => "RABBIT",
            Self::Sheep => "SHEEP",
        }
    }
}

impl std::str::FromStr for Species {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_vocabulary(s, Self::ALL, Self::as_str, "species")
    }
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sex
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    pub const ALL: &'static [Sex] = &[Self::Female, Self::Male];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Female => "FEMALE",
            Self::Male => "MALE",
        }
    }
}

impl std::str::FromStr for Sex {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_vocabulary(s, Self::ALL, Self::as_str, "sex")
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an animal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnimalStatus {
    #[default]
    Active,
    Breeding,
    Retired,
    Sold,
    Deceased,
    /// Minimal record created to satisfy a parent link during import.
    Prospect,
}

impl AnimalStatus {
    pub const ALL: &'static [AnimalStatus] = &[
        Self::Active,
        Self::Breeding,
        Self::Retired,
        Self::Sold,
        Self::Deceased,
        Self::Prospect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Breeding => "BREEDING",
            Self::Retired => "RETIRED",
            Self::Sold => "SOLD",
            Self::Deceased => "DECEASED",
            Self::Prospect => "PROSPECT",
        }
    }
}

impl std::str::FromStr for AnimalStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_vocabulary(s, Self::ALL, Self::as_str, "status")
    }
}

impl std::fmt::Display for AnimalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comma-separated canonical names, used in validation messages.
pub fn vocabulary_list<T: Copy>(all: &[T], name: fn(&T) -> &'static str) -> String {
    all.iter().map(name).collect::<Vec<_>>().join(", ")
}

fn parse_vocabulary<T: Copy>(
    s: &str,
    all: &[T],
    name: fn(&T) -> &'static str,
    what: &str,
) -> Result<T, CoreError> {
    let trimmed = s.trim();
    all.iter()
        .find(|v| name(v).eq_ignore_ascii_case(trimmed))
        .copied()
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid {what} '{trimmed}'. Must be one of: {}",
                vocabulary_list(all, name)
            ))
        })
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// An animal as held by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalRecord {
    pub id: DbId,
    pub name: String,
    pub species: Species,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
    pub microchip: Option<String>,
    pub breed: Option<String>,
    pub status: AnimalStatus,
    pub notes: Option<String>,
    pub dam_id: Option<DbId>,
    pub sire_id: Option<DbId>,
}

/// Input for inserting a new animal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnimal {
    pub name: String,
    pub species: Species,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
    pub microchip: Option<String>,
    pub breed: Option<String>,
    pub status: AnimalStatus,
    pub notes: Option<String>,
    pub dam_id: Option<DbId>,
    pub sire_id: Option<DbId>,
}

/// Partial update of an existing animal. Only `Some` fields are applied;
/// identity fields (name, species, sex) are never touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimalUpdate {
    pub birth_date: Option<NaiveDate>,
    pub microchip: Option<String>,
    pub breed: Option<String>,
    pub status: Option<AnimalStatus>,
    pub notes: Option<String>,
    pub dam_id: Option<DbId>,
    pub sire_id: Option<DbId>,
}

impl AnimalRecord {
    /// Apply a partial update in place, mirroring the store's COALESCE semantics.
    pub fn apply(&mut self, update: &AnimalUpdate) {
        if let Some(date) = update.birth_date {
            self.birth_date = Some(date);
        }
        if let Some(chip) = &update.microchip {
            self.microchip = Some(chip.clone());
        }
        if let Some(breed) = &update.breed {
            self.breed = Some(breed.clone());
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(notes) = &update.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(dam) = update.dam_id {
            self.dam_id = Some(dam);
        }
        if let Some(sire) = update.sire_id {
            self.sire_id = Some(sire);
        }
    }
}

/// A registry (kennel club, studbook, ...) that issues identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub id: DbId,
    pub name: String,
}

/// Link between an animal and a registry, carrying the registry's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub animal_id: DbId,
    pub registry_id: DbId,
    pub identifier: String,
}
