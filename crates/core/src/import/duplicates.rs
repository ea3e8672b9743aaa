//! Duplicate detection for validated import rows.
//!
//! A row duplicates an existing record when either
//!
//! - name (case-insensitive), species, sex and birth date all agree, with two
//!   absent birth dates counting as equal, or
//! - both sides carry a microchip and the microchips are identical.
//!
//! When several records qualify, the one with the lowest id is reported so
//! repeated runs surface the same record.

use super::row::{AnimalRow, AnimalSnapshot, ParsedRow, RowStatus, RowWarning};
use super::store::{AnimalLookup, StoreError};
use crate::animal::{AnimalRecord, Sex, Species};
use chrono::NaiveDate;

/// Whether `record` duplicates `row` under the rules above.
pub fn is_duplicate(row: &AnimalRow, record: &AnimalRecord) -> bool {
    duplicates_fields(
        row,
        &record.name,
        record.species,
        record.sex,
        record.birth_date,
        record.microchip.as_deref(),
    )
}

/// [`is_duplicate`] against a record that only exists as loose fields.
pub(crate) fn duplicates_fields(
    row: &AnimalRow,
    name: &str,
    species: Species,
    sex: Sex,
    birth_date: Option<NaiveDate>,
    microchip: Option<&str>,
) -> bool {
    let same_identity = name.to_lowercase() == row.name.to_lowercase()
        && species == row.species
        && sex == row.sex
        && birth_date == row.birth_date;

    let same_chip = matches!(
        (row.microchip.as_deref(), microchip),
        (Some(a), Some(b)) if a == b
    );

    same_identity || same_chip
}

/// Pick the record to surface among qualifying ones: lowest id.
pub fn pick_duplicate<'a>(
    row: &AnimalRow,
    records: impl IntoIterator<Item = &'a AnimalRecord>,
) -> Option<&'a AnimalRecord> {
    records
        .into_iter()
        .filter(|r| is_duplicate(row, r))
        .min_by_key(|r| r.id)
}

/// Look up the existing record that `row` duplicates, if any.
pub async fn find_duplicate<L>(
    lookup: &mut L,
    row: &AnimalRow,
) -> Result<Option<AnimalRecord>, StoreError>
where
    L: AnimalLookup + ?Sized,
{
    let mut candidates = lookup
        .find_by_identity(&row.name, row.species, row.sex, row.birth_date)
        .await?;
    if let Some(chip) = row.microchip.as_deref() {
        candidates.extend(lookup.find_by_microchip(chip).await?);
    }

    Ok(pick_duplicate(row, &candidates).cloned())
}

/// Run duplicate detection on a parsed row, downgrading it to a warning on
/// a match. Rows that are not valid are left untouched.
pub async fn detect_duplicate<L>(lookup: &mut L, row: &mut ParsedRow) -> Result<(), StoreError>
where
    L: AnimalLookup + ?Sized,
{
    if row.status != RowStatus::Valid {
        return Ok(());
    }
    let Some(animal) = row.animal.as_ref() else {
        return Ok(());
    };

    if let Some(existing) = find_duplicate(lookup, animal).await? {
        tracing::debug!(
            row_number = row.row_number,
            existing_id = existing.id,
            "Row duplicates an existing animal"
        );
        row.push_warning(RowWarning::Duplicate {
            duplicate_match: AnimalSnapshot::from(&existing),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
