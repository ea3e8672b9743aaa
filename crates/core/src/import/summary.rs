//! Result types returned by preview and execute.

use serde::{Deserialize, Serialize};

use super::row::{ParentField, ParsedRow, RowStatus};
use crate::animal::AnimalRecord;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub warning_rows: usize,
    pub error_rows: usize,
}

/// Read-only outcome of parsing and enriching an import file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportPreview {
    pub summary: PreviewSummary,
    pub rows: Vec<ParsedRow>,
}

impl ImportPreview {
    pub fn from_rows(rows: Vec<ParsedRow>) -> Self {
        let mut summary = PreviewSummary {
            total_rows: rows.len(),
            ..Default::default()
        };
        for row in &rows {
            match row.status {
                RowStatus::Valid => summary.valid_rows += 1,
                RowStatus::Warning => summary.warning_rows += 1,
                RowStatus::Error => summary.error_rows += 1,
            }
        }
        Self { summary, rows }
    }
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

/// Why a row produced no write during execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFailureKind {
    /// The row failed field validation.
    Validation,
    /// A warning row arrived without the resolution it needs.
    ResolutionMissing,
    /// A resolution referenced a missing or ineligible record.
    LinkIntegrity,
    /// The store rejected one of the row's writes.
    Store,
}

impl RowFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::ResolutionMissing => "resolution_missing",
            Self::LinkIntegrity => "link_integrity",
            Self::Store => "store",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedAnimal {
    pub row_number: usize,
    pub id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_number: usize,
    pub name: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderCreated {
    pub row_number: usize,
    pub parent_field: ParentField,
    pub id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRow {
    pub row_number: usize,
    pub name: Option<String>,
    pub kind: RowFailureKind,
    pub message: String,
}

/// Outcome of an execute call: one entry per row in exactly one of
/// `imported_animals`, `updated_animals`, `skipped_rows` or `failed_rows`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub imported_animals: Vec<ImportedAnimal>,
    pub updated_animals: Vec<ImportedAnimal>,
    pub skipped_rows: Vec<SkippedRow>,
    pub placeholders_created: Vec<PlaceholderCreated>,
    pub failed_rows: Vec<FailedRow>,
}

impl ImportSummary {
    pub fn new(total_rows: usize) -> Self {
        Self {
            total_rows,
            ..Default::default()
        }
    }

    pub(crate) fn record_imported(&mut self, row_number: usize, animal: &AnimalRecord) {
        self.imported += 1;
        self.imported_animals.push(ImportedAnimal {
            row_number,
            id: animal.id,
            name: animal.name.clone(),
        });
    }

    pub(crate) fn record_updated(&mut self, row_number: usize, animal: &AnimalRecord) {
        self.updated += 1;
        self.updated_animals.push(ImportedAnimal {
            row_number,
            id: animal.id,
            name: animal.name.clone(),
        });
    }

    pub(crate) fn record_skipped(&mut self, row: &ParsedRow, reason: String) {
        self.skipped += 1;
        self.skipped_rows.push(SkippedRow {
            row_number: row.row_number,
            name: row.raw.name.clone(),
            reason,
        });
    }

    pub(crate) fn record_failed(&mut self, row: &ParsedRow, kind: RowFailureKind, message: String) {
        self.errors += 1;
        self.failed_rows.push(FailedRow {
            row_number: row.row_number,
            name: row.raw.name.clone(),
            kind,
            message,
        });
    }
}
