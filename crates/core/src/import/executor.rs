//! Import execution.
//!
//! Rows are processed strictly in input order, each inside its own store
//! transaction. A row is enriched against the live store right before it is
//! written, so later rows see records created by earlier rows of the same
//! batch (a parent created on row 2 links automatically on row 5). Any
//! failure rolls back that row only; the batch carries on.

use std::collections::HashSet;

use super::duplicates::is_duplicate;
use super::error::ImportError;
use super::parser::{parse_import, ImportOptions};
use super::preview::enrich_row;
use super::resolution::{DuplicateAction, ParentAction, ResolutionSet, RowResolution, RowResolutions};
use super::row::{AnimalRow, ParentField, ParentLinks, ParsedRow, RowStatus};
use super::store::{AnimalLookup, ImportStore, RowTransaction, StoreError};
use super::summary::{ImportSummary, PlaceholderCreated, RowFailureKind};
use crate::animal::{AnimalRecord, AnimalStatus, AnimalUpdate, NewAnimal, Species};
use crate::types::DbId;

/// Notes written on placeholder parents.
pub const PLACEHOLDER_NOTE: &str = "Placeholder parent created by spreadsheet import";

// ---------------------------------------------------------------------------
// Row outcomes
// ---------------------------------------------------------------------------

enum WriteKind {
    Imported,
    Updated,
}

enum RowEffect {
    Written {
        kind: WriteKind,
        animal: AnimalRecord,
        placeholders: Vec<PlaceholderCreated>,
    },
    Skipped {
        reason: String,
    },
}

enum RowAbort {
    /// The row fails; the batch continues.
    Failed(RowFailureKind, String),
    /// The store is gone; the batch stops.
    Fatal(StoreError),
}

impl From<StoreError> for RowAbort {
    fn from(err: StoreError) -> Self {
        if err.is_fatal() {
            Self::Fatal(err)
        } else {
            Self::Failed(RowFailureKind::Store, err.to_string())
        }
    }
}

fn link_error(message: String) -> RowAbort {
    RowAbort::Failed(RowFailureKind::LinkIntegrity, message)
}

fn missing_resolution(message: String) -> RowAbort {
    RowAbort::Failed(RowFailureKind::ResolutionMissing, message)
}

enum WriteTarget {
    Create,
    Update(AnimalRecord),
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Re-parse `text`, apply `resolutions` and write every row that can be
/// written.
///
/// Returns `Err` only for structural problems with the file or resolutions
/// and for an unreachable store. Every row-level problem ends up in the
/// returned summary.
pub async fn execute_import(
    store: &dyn ImportStore,
    text: &str,
    resolutions: &[RowResolution],
    options: &ImportOptions,
) -> Result<ImportSummary, ImportError> {
    let rows = parse_import(text, options)?;
    let resolutions = ResolutionSet::build(resolutions)?;
    let mut summary = ImportSummary::new(rows.len());

    tracing::info!(
        rows = rows.len(),
        resolutions = resolutions.len(),
        "Executing import"
    );

    for mut row in rows {
        if row.status == RowStatus::Error {
            let message = row.error_text();
            summary.record_failed(&row, RowFailureKind::Validation, message);
            continue;
        }

        let mut tx = match store.begin().await {
            Ok(tx) => tx,
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                tracing::warn!(row_number = row.row_number, error = %err, "Row transaction could not start");
                summary.record_failed(&row, RowFailureKind::Store, err.to_string());
                continue;
            }
        };
        let row_resolutions = resolutions.for_row(row.row_number);
        let result = process_row(tx.as_mut(), &mut row, row_resolutions).await;

        match result {
            Ok(effect) => match tx.commit().await {
                Ok(()) => record_effect(&mut summary, &row, effect),
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(row_number = row.row_number, error = %err, "Row commit failed");
                    summary.record_failed(&row, RowFailureKind::Store, err.to_string());
                }
            },
            Err(RowAbort::Fatal(err)) => {
                tracing::error!(row_number = row.row_number, error = %err, "Record store failed, aborting import");
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(row_number = row.row_number, error = %rollback_err, "Row rollback failed");
                }
                return Err(err.into());
            }
            Err(RowAbort::Failed(kind, message)) => {
                tracing::info!(
                    row_number = row.row_number,
                    kind = kind.as_str(),
                    %message,
                    "Row not imported"
                );
                if let Err(err) = tx.rollback().await {
                    if err.is_fatal() {
                        return Err(err.into());
                    }
                    tracing::warn!(row_number = row.row_number, error = %err, "Row rollback failed");
                }
                summary.record_failed(&row, kind, message);
            }
        }
    }

    tracing::info!(
        imported = summary.imported,
        updated = summary.updated,
        skipped = summary.skipped,
        errors = summary.errors,
        placeholders = summary.placeholders_created.len(),
        "Import finished"
    );
    Ok(summary)
}

fn record_effect(summary: &mut ImportSummary, row: &ParsedRow, effect: RowEffect) {
    match effect {
        RowEffect::Written {
            kind,
            animal,
            placeholders,
        } => {
            match kind {
                WriteKind::Imported => summary.record_imported(row.row_number, &animal),
                WriteKind::Updated => summary.record_updated(row.row_number, &animal),
            }
            summary.placeholders_created.extend(placeholders);
        }
        RowEffect::Skipped { reason } => summary.record_skipped(row, reason),
    }
}

// ---------------------------------------------------------------------------
// Per-row processing
// ---------------------------------------------------------------------------

async fn process_row(
    tx: &mut dyn RowTransaction,
    row: &mut ParsedRow,
    resolutions: RowResolutions,
) -> Result<RowEffect, RowAbort> {
    enrich_row(tx, row).await?;

    let Some(animal) = row.animal.clone() else {
        return Err(RowAbort::Failed(RowFailureKind::Validation, row.error_text()));
    };

    let target = match row.duplicate_match() {
        None => WriteTarget::Create,
        Some(existing) => {
            let existing_label = match existing.id {
                Some(id) => format!("{id} ('{}')", existing.name),
                None => format!("'{}'", existing.name),
            };
            match resolutions.duplicate {
                None => {
                    return Err(missing_resolution(format!(
                        "Row duplicates existing animal {existing_label}; a duplicate resolution is required"
                    )))
                }
                Some(DuplicateAction::Skip) => {
                    return Ok(RowEffect::Skipped {
                        reason: format!("Duplicate of existing animal {existing_label}"),
                    })
                }
                Some(DuplicateAction::Update { existing_animal_id }) => {
                    WriteTarget::Update(update_target(tx, &animal, existing_animal_id).await?)
                }
                Some(DuplicateAction::CreateNew) => WriteTarget::Create,
            }
        }
    };

    let mut links = row.parent_links;
    let mut placeholders = Vec::new();
    for field in [ParentField::Dam, ParentField::Sire] {
        if row.parent_warning(field).is_none() {
            continue;
        }
        let parent_name = animal.parent_name(field).unwrap_or_default();
        let linked = match resolutions.parent(field) {
            None => {
                return Err(missing_resolution(format!(
                    "No unique match for {field} '{parent_name}'; a {field} resolution is required"
                )))
            }
            Some(ParentAction::Skip) => None,
            Some(ParentAction::Link { selected_animal_id }) => {
                verify_parent(tx, selected_animal_id, animal.species, field).await?;
                Some(selected_animal_id)
            }
            Some(ParentAction::CreatePlaceholder) => {
                if let Some(kept) = kept_parent(&target, field) {
                    tracing::debug!(
                        row_number = row.row_number,
                        parent_field = field.as_str(),
                        kept_id = kept,
                        "Existing parent link kept, no placeholder created"
                    );
                    continue;
                }
                let placeholder = tx
                    .insert_animal(&placeholder_parent(&animal, field, row.row_number))
                    .await?;
                tracing::debug!(
                    row_number = row.row_number,
                    parent_field = field.as_str(),
                    placeholder_id = placeholder.id,
                    "Created placeholder parent"
                );
                placeholders.push(PlaceholderCreated {
                    row_number: row.row_number,
                    parent_field: field,
                    id: placeholder.id,
                    name: placeholder.name.clone(),
                });
                Some(placeholder.id)
            }
        };
        links.set(field, linked);
    }

    let (kind, record) = match target {
        WriteTarget::Create => {
            let record = tx.insert_animal(&new_animal(&animal, links)).await?;
            (WriteKind::Imported, record)
        }
        WriteTarget::Update(existing) => {
            let update = build_update(tx, &animal, &existing, links).await?;
            let record = tx.update_animal(existing.id, &update).await?;
            (WriteKind::Updated, record)
        }
    };

    if let Some((registry_name, identifier)) = animal.registration() {
        let registry = tx.find_or_create_registry(registry_name).await?;
        tx.link_registry(record.id, registry.id, identifier).await?;
    }

    tracing::debug!(row_number = row.row_number, animal_id = record.id, "Row written");
    Ok(RowEffect::Written {
        kind,
        animal: record,
        placeholders,
    })
}

/// Load the record an `update` resolution names. It must exist and be a
/// duplicate of the row; any other record is off limits.
async fn update_target<L>(
    lookup: &mut L,
    animal: &AnimalRow,
    id: DbId,
) -> Result<AnimalRecord, RowAbort>
where
    L: AnimalLookup + ?Sized,
{
    let existing = lookup
        .find_by_id(id)
        .await?
        .ok_or_else(|| link_error(format!("Existing animal {id} does not exist")))?;

    if !is_duplicate(animal, &existing) {
        return Err(link_error(format!(
            "Animal {id} ('{}', {} {}) is not a duplicate of this row and cannot be updated by it",
            existing.name, existing.species, existing.sex
        )));
    }
    Ok(existing)
}

/// The parent an updated record already has on `field`. Such links are
/// never replaced.
fn kept_parent(target: &WriteTarget, field: ParentField) -> Option<DbId> {
    match (target, field) {
        (WriteTarget::Create, _) => None,
        (WriteTarget::Update(existing), ParentField::Dam) => existing.dam_id,
        (WriteTarget::Update(existing), ParentField::Sire) => existing.sire_id,
    }
}

/// Check that `id` exists and may be the `field` parent of a `species` animal.
async fn verify_parent<L>(
    lookup: &mut L,
    id: DbId,
    species: Species,
    field: ParentField,
) -> Result<AnimalRecord, RowAbort>
where
    L: AnimalLookup + ?Sized,
{
    let parent = lookup
        .find_by_id(id)
        .await?
        .ok_or_else(|| link_error(format!("Selected {field} {id} does not exist")))?;

    let required_sex = field.required_sex();
    if parent.species != species || parent.sex != required_sex {
        return Err(link_error(format!(
            "Animal {id} ('{}') is {} {}; a {field} must be {species} {required_sex}",
            parent.name, parent.species, parent.sex
        )));
    }
    Ok(parent)
}

/// Fields to overwrite on an existing record. Blank cells never clear
/// existing values, status changes only when the Status cell was filled in,
/// and parents fill empty links only.
async fn build_update(
    tx: &mut dyn RowTransaction,
    animal: &AnimalRow,
    existing: &AnimalRecord,
    links: ParentLinks,
) -> Result<AnimalUpdate, RowAbort> {
    let mut update = AnimalUpdate {
        birth_date: animal.birth_date,
        microchip: animal.microchip.clone(),
        breed: animal.breed.clone(),
        status: animal.status_provided.then_some(animal.status),
        notes: animal.notes.clone(),
        dam_id: None,
        sire_id: None,
    };

    if existing.dam_id.is_none() {
        if let Some(dam) = links.dam_id {
            ensure_not_ancestor(tx, existing.id, dam).await?;
            update.dam_id = Some(dam);
        }
    }
    if existing.sire_id.is_none() {
        if let Some(sire) = links.sire_id {
            ensure_not_ancestor(tx, existing.id, sire).await?;
            update.sire_id = Some(sire);
        }
    }
    Ok(update)
}

/// Reject linking `parent_id` as a parent of `animal_id` when `animal_id`
/// already appears in `parent_id`'s ancestry (or is `parent_id` itself).
async fn ensure_not_ancestor<L>(
    lookup: &mut L,
    animal_id: DbId,
    parent_id: DbId,
) -> Result<(), RowAbort>
where
    L: AnimalLookup + ?Sized,
{
    let mut pending = vec![parent_id];
    let mut seen = HashSet::new();

    while let Some(id) = pending.pop() {
        if id == animal_id {
            return Err(link_error(format!(
                "Linking {parent_id} as a parent of {animal_id} would make {animal_id} its own ancestor"
            )));
        }
        if !seen.insert(id) {
            continue;
        }
        if let Some(record) = lookup.find_by_id(id).await? {
            pending.extend(record.dam_id);
            pending.extend(record.sire_id);
        }
    }
    Ok(())
}

fn new_animal(animal: &AnimalRow, links: ParentLinks) -> NewAnimal {
    NewAnimal {
        name: animal.name.clone(),
        species: animal.species,
        sex: animal.sex,
        birth_date: animal.birth_date,
        microchip: animal.microchip.clone(),
        breed: animal.breed.clone(),
        status: animal.status,
        notes: animal.notes.clone(),
        dam_id: links.dam_id,
        sire_id: links.sire_id,
    }
}

fn placeholder_parent(animal: &AnimalRow, field: ParentField, row_number: usize) -> NewAnimal {
    NewAnimal {
        name: animal.parent_name(field).unwrap_or_default().to_string(),
        species: animal.species,
        sex: field.required_sex(),
        birth_date: None,
        microchip: None,
        breed: None,
        status: AnimalStatus::Prospect,
        notes: Some(format!("{PLACEHOLDER_NOTE} (row {row_number})")),
        dam_id: None,
        sire_id: None,
    }
}
