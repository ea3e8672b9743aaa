//! Read-only preview: parse, validate and enrich without writing.
//!
//! Execute processes rows in order and later rows see records written by
//! earlier ones. Preview never writes, so it tracks the records executing the
//! earlier rows could create and matches each row against those as well.
//! A row that preview reports as valid never needs a resolution at execute
//! time.

use super::duplicates::{detect_duplicate, duplicates_fields};
use super::error::ImportError;
use super::parents::{match_parents, rank_candidates, same_name};
use super::parser::{parse_import, ImportOptions};
use super::row::{AnimalRow, AnimalSnapshot, ParentField, ParsedRow, RowStatus, RowWarning};
use super::store::{AnimalLookup, ImportStore, StoreError};
use super::summary::ImportPreview;
use crate::animal::{AnimalStatus, Sex, Species};
use chrono::NaiveDate;

/// Run duplicate detection and parent matching on one parsed row.
///
/// Only ever downgrades valid rows to warnings; error rows pass through.
pub async fn enrich_row<L>(lookup: &mut L, row: &mut ParsedRow) -> Result<(), StoreError>
where
    L: AnimalLookup + ?Sized,
{
    detect_duplicate(lookup, row).await?;
    match_parents(lookup, row).await?;
    Ok(())
}

/// Parse `text` and classify every row against the current store contents
/// and the earlier rows of the same file.
///
/// Performs no writes, so any number of previews may run concurrently.
pub async fn preview_import(
    store: &dyn ImportStore,
    text: &str,
    options: &ImportOptions,
) -> Result<ImportPreview, ImportError> {
    let mut rows = parse_import(text, options)?;
    let mut lookup = store.lookup().await?;
    let mut pending = PendingRecords::default();

    for row in &mut rows {
        enrich_row(lookup.as_mut(), row).await?;
        pending.reconcile(lookup.as_mut(), row).await?;
        pending.record(row);
    }

    let preview = ImportPreview::from_rows(rows);
    tracing::info!(
        total = preview.summary.total_rows,
        valid = preview.summary.valid_rows,
        warnings = preview.summary.warning_rows,
        errors = preview.summary.error_rows,
        "Import preview computed"
    );
    Ok(preview)
}

// ---------------------------------------------------------------------------
// Records of earlier rows
// ---------------------------------------------------------------------------

/// A record that executing an earlier row may write.
#[derive(Debug, Clone)]
struct PendingAnimal {
    source_row: usize,
    /// Written whatever the resolutions: the row itself, previewed as valid.
    certain: bool,
    name: String,
    species: Species,
    sex: Sex,
    birth_date: Option<NaiveDate>,
    microchip: Option<String>,
    breed: Option<String>,
    status: AnimalStatus,
}

impl PendingAnimal {
    fn snapshot(&self) -> AnimalSnapshot {
        AnimalSnapshot {
            id: None,
            source_row: Some(self.source_row),
            name: self.name.clone(),
            species: self.species,
            sex: self.sex,
            birth_date: self.birth_date,
            breed: self.breed.clone(),
            microchip: self.microchip.clone(),
            status: self.status,
        }
    }
}

/// Every record the rows seen so far could create, whatever their
/// resolutions turn out to be.
#[derive(Debug, Default)]
struct PendingRecords {
    animals: Vec<PendingAnimal>,
}

impl PendingRecords {
    /// Downgrade `row` where records of earlier rows change its outcome.
    async fn reconcile<L>(&self, lookup: &mut L, row: &mut ParsedRow) -> Result<(), StoreError>
    where
        L: AnimalLookup + ?Sized,
    {
        if row.status == RowStatus::Error {
            return Ok(());
        }
        let Some(animal) = row.animal.clone() else {
            return Ok(());
        };

        if row.duplicate_match().is_none() {
            if let Some(earlier) = self.duplicate_of(&animal) {
                tracing::debug!(
                    row_number = row.row_number,
                    source_row = earlier.source_row,
                    "Row duplicates an earlier row of the file"
                );
                row.push_warning(RowWarning::Duplicate {
                    duplicate_match: earlier.snapshot(),
                });
            }
        }

        for field in [ParentField::Dam, ParentField::Sire] {
            let Some(name) = animal.parent_name(field) else {
                continue;
            };
            let named: Vec<&PendingAnimal> = self
                .animals
                .iter()
                .filter(|p| {
                    p.species == animal.species
                        && p.sex == field.required_sex()
                        && same_name(name, &p.name)
                })
                .collect();
            if named.is_empty() {
                continue;
            }

            if row.parent_links.get(field).is_some() {
                // The stored match stops being unique once the earlier row writes.
                let pool = lookup
                    .list_by_species_and_sex(animal.species, field.required_sex())
                    .await?;
                row.parent_links.set(field, None);
                row.push_warning(RowWarning::ParentNotFound {
                    parent_field: field,
                    parent_name: name.to_string(),
                    suggestions: rank_candidates(name, &pool),
                });
                continue;
            }

            let stored_exact = row
                .parent_warning(field)
                .is_some_and(|suggestions| suggestions.iter().any(|c| same_name(name, &c.name)));
            if let [only] = named.as_slice() {
                if only.certain && !stored_exact {
                    // Execute links the record written by that row.
                    tracing::debug!(
                        row_number = row.row_number,
                        parent_field = field.as_str(),
                        source_row = only.source_row,
                        "Parent resolves to an earlier row of the file"
                    );
                    row.clear_parent_warning(field);
                }
            }
        }
        Ok(())
    }

    /// Add what executing `row` may write: the row itself, the duplicate it
    /// may update, and a placeholder for each unresolved parent.
    fn record(&mut self, row: &ParsedRow) {
        if row.status == RowStatus::Error {
            return;
        }
        let Some(animal) = row.animal.as_ref() else {
            return;
        };

        self.animals.push(PendingAnimal {
            source_row: row.row_number,
            certain: row.status == RowStatus::Valid,
            name: animal.name.clone(),
            species: animal.species,
            sex: animal.sex,
            birth_date: animal.birth_date,
            microchip: animal.microchip.clone(),
            breed: animal.breed.clone(),
            status: animal.status,
        });

        if let Some(existing) = row.duplicate_match().filter(|m| m.id.is_some()) {
            self.animals.push(PendingAnimal {
                source_row: row.row_number,
                certain: false,
                name: existing.name.clone(),
                species: existing.species,
                sex: existing.sex,
                birth_date: animal.birth_date.or(existing.birth_date),
                microchip: animal.microchip.clone().or_else(|| existing.microchip.clone()),
                breed: animal.breed.clone().or_else(|| existing.breed.clone()),
                status: existing.status,
            });
        }

        for field in [ParentField::Dam, ParentField::Sire] {
            if row.parent_warning(field).is_none() {
                continue;
            }
            if let Some(name) = animal.parent_name(field) {
                self.animals.push(PendingAnimal {
                    source_row: row.row_number,
                    certain: false,
                    name: name.to_string(),
                    species: animal.species,
                    sex: field.required_sex(),
                    birth_date: None,
                    microchip: None,
                    breed: None,
                    status: AnimalStatus::Prospect,
                });
            }
        }
    }

    fn duplicate_of(&self, animal: &AnimalRow) -> Option<&PendingAnimal> {
        self.animals
            .iter()
            .find(|p| {
                duplicates_fields(
                    animal,
                    &p.name,
                    p.species,
                    p.sex,
                    p.birth_date,
                    p.microchip.as_deref(),
                )
            })
    }
}
