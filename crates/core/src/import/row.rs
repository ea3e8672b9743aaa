//! Per-row types produced by parsing and enrichment.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::animal::{AnimalRecord, AnimalStatus, Sex, Species};
use crate::types::DbId;

/// Classification of a row after validation and enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Valid,
    Warning,
    Error,
}

/// Which parent a reference or resolution concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentField {
    Dam,
    Sire,
}

impl ParentField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dam => "dam",
            Self::Sire => "sire",
        }
    }

    /// The sex a record must have to be linked on this side.
    pub fn required_sex(&self) -> Sex {
        match self {
            Self::Dam => Sex::Female,
            Self::Sire => Sex::Male,
        }
    }
}

impl std::fmt::Display for ParentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trimmed cell values of one data row, keyed by the known columns.
///
/// Blank cells are `None`. Cells from unrecognised columns are kept in
/// `extra` so the preview can echo the whole row back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub name: Option<String>,
    pub species: Option<String>,
    pub sex: Option<String>,
    pub birth_date: Option<String>,
    pub microchip: Option<String>,
    pub breed: Option<String>,
    pub dam_name: Option<String>,
    pub sire_name: Option<String>,
    pub registry_name: Option<String>,
    pub registry_number: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub extra: BTreeMap<String, String>,
}

impl RawRow {
    /// `true` when no cell, known or unknown, has content.
    pub fn is_blank(&self) -> bool {
        [
            &self.name,
            &self.species,
            &self.sex,
            &self.birth_date,
            &self.microchip,
            &self.breed,
            &self.dam_name,
            &self.sire_name,
            &self.registry_name,
            &self.registry_number,
            &self.status,
            &self.notes,
        ]
        .iter()
        .all(|cell| cell.is_none())
            && self.extra.is_empty()
    }
}

/// Typed fields of a row that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalRow {
    pub name: String,
    pub species: Species,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
    pub microchip: Option<String>,
    pub breed: Option<String>,
    pub dam_name: Option<String>,
    pub sire_name: Option<String>,
    pub registry_name: Option<String>,
    pub registry_number: Option<String>,
    pub status: AnimalStatus,
    /// Whether the Status cell was filled in (as opposed to defaulted).
    #[serde(skip)]
    pub status_provided: bool,
    pub notes: Option<String>,
}

impl AnimalRow {
    pub fn parent_name(&self, field: ParentField) -> Option<&str> {
        match field {
            ParentField::Dam => self.dam_name.as_deref(),
            ParentField::Sire => self.sire_name.as_deref(),
        }
    }

    /// Registry name and number, only when both are present.
    pub fn registration(&self) -> Option<(&str, &str)> {
        match (&self.registry_name, &self.registry_number) {
            (Some(name), Some(number)) => Some((name.as_str(), number.as_str())),
            _ => None,
        }
    }
}

/// A single validation violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub field: String,
    pub message: String,
}

impl RowError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Snapshot of the record that a row duplicates.
///
/// The record is either already stored (`id` is set) or will be written by
/// an earlier row of the same file (`source_row` is set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalSnapshot {
    pub id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_row: Option<usize>,
    pub name: String,
    pub species: Species,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
    pub breed: Option<String>,
    pub microchip: Option<String>,
    pub status: AnimalStatus,
}

impl From<&AnimalRecord> for AnimalSnapshot {
    fn from(record: &AnimalRecord) -> Self {
        Self {
            id: Some(record.id),
            source_row: None,
            name: record.name.clone(),
            species: record.species,
            sex: record.sex,
            birth_date: record.birth_date,
            breed: record.breed.clone(),
            microchip: record.microchip.clone(),
            status: record.status,
        }
    }
}

/// A suggested parent record with its name similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub id: DbId,
    pub name: String,
    pub species: Species,
    pub sex: Sex,
    pub breed: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub similarity: f64,
}

/// A recoverable condition that needs a resolution before the row can be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "warning_type", rename_all = "snake_case")]
pub enum RowWarning {
    Duplicate {
        duplicate_match: AnimalSnapshot,
    },
    ParentNotFound {
        parent_field: ParentField,
        parent_name: String,
        suggestions: Vec<MatchCandidate>,
    },
}

/// Parent ids settled without human input (unique exact name match).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLinks {
    pub dam_id: Option<DbId>,
    pub sire_id: Option<DbId>,
}

impl ParentLinks {
    pub fn get(&self, field: ParentField) -> Option<DbId> {
        match field {
            ParentField::Dam => self.dam_id,
            ParentField::Sire => self.sire_id,
        }
    }

    pub fn set(&mut self, field: ParentField, id: Option<DbId>) {
        match field {
            ParentField::Dam => self.dam_id = id,
            ParentField::Sire => self.sire_id = id,
        }
    }
}

/// One data row after parsing, validation and (for valid rows) enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRow {
    /// 1-based position among data rows; the header is not counted.
    pub row_number: usize,
    pub raw: RawRow,
    /// Present once the row has passed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animal: Option<AnimalRow>,
    pub status: RowStatus,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<RowError>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<RowWarning>,
    #[serde(default)]
    pub parent_links: ParentLinks,
}

impl ParsedRow {
    /// Attach a warning, downgrading a valid row. Error rows stay errors.
    pub fn push_warning(&mut self, warning: RowWarning) {
        if self.status == RowStatus::Error {
            return;
        }
        self.status = RowStatus::Warning;
        self.warnings.push(warning);
    }

    /// Drop the parent warning for `field`. A row left without warnings is
    /// valid again.
    pub(crate) fn clear_parent_warning(&mut self, field: ParentField) {
        self.warnings.retain(|w| {
            !matches!(w, RowWarning::ParentNotFound { parent_field, .. } if *parent_field == field)
        });
        if self.status == RowStatus::Warning && self.warnings.is_empty() {
            self.status = RowStatus::Valid;
        }
    }

    pub fn duplicate_match(&self) -> Option<&AnimalSnapshot> {
        self.warnings.iter().find_map(|w| match w {
            RowWarning::Duplicate { duplicate_match } => Some(duplicate_match),
            _ => None,
        })
    }

    /// The unresolved parent warning for `field`, if any.
    pub fn parent_warning(&self, field: ParentField) -> Option<&[MatchCandidate]> {
        self.warnings.iter().find_map(|w| match w {
            RowWarning::ParentNotFound {
                parent_field,
                suggestions,
                ..
            } if *parent_field == field => Some(suggestions.as_slice()),
            _ => None,
        })
    }

    /// Joined error messages, for summaries and logs.
    pub fn error_text(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_row() -> ParsedRow {
        ParsedRow {
            row_number: 1,
            raw: RawRow::default(),
            animal: None,
            status: RowStatus::Valid,
            errors: Vec::new(),
            warnings: Vec::new(),
            parent_links: ParentLinks::default(),
        }
    }

    fn parent_warning(field: ParentField) -> RowWarning {
        RowWarning::ParentNotFound {
            parent_field: field,
            parent_name: "Daisy".into(),
            suggestions: Vec::new(),
        }
    }

    #[test]
    fn warning_downgrades_valid_row() {
        let mut row = valid_row();
        row.push_warning(parent_warning(ParentField::Dam));
        assert_eq!(row.status, RowStatus::Warning);
        assert!(row.parent_warning(ParentField::Dam).is_some());
        assert!(row.parent_warning(ParentField::Sire).is_none());
    }

    #[test]
    fn warning_never_upgrades_error_row() {
        let mut row = valid_row();
        row.status = RowStatus::Error;
        row.push_warning(parent_warning(ParentField::Sire));
        assert_eq!(row.status, RowStatus::Error);
        assert!(row.warnings.is_empty());
    }

    #[test]
    fn clearing_last_parent_warning_restores_valid() {
        let mut row = valid_row();
        row.push_warning(parent_warning(ParentField::Dam));
        row.push_warning(parent_warning(ParentField::Sire));

        row.clear_parent_warning(ParentField::Dam);
        assert_eq!(row.status, RowStatus::Warning);
        row.clear_parent_warning(ParentField::Sire);
        assert_eq!(row.status, RowStatus::Valid);
        assert!(row.warnings.is_empty());
    }

    #[test]
    fn warning_serializes_with_type_tag() {
        let json = serde_json::to_value(parent_warning(ParentField::Sire)).unwrap();
        assert_eq!(json["warning_type"], "parent_not_found");
        assert_eq!(json["parent_field"], "sire");
    }

    #[test]
    fn blank_raw_row_detected() {
        let mut raw = RawRow::default();
        assert!(raw.is_blank());
        raw.extra.insert("Colour".into(), "red".into());
        assert!(!raw.is_blank());
    }
}
