//! Caller decisions for warning rows.
//!
//! A resolution is pure data. The shapes make the id requirements explicit:
//! `existing_animal_id` exists only on the `update` action and
//! `selected_animal_id` only on the `link` action. Whether the referenced
//! ids exist or are eligible is checked by the executor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::ImportError;
use super::row::ParentField;
use crate::types::DbId;

/// What to do with a row that duplicates an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DuplicateAction {
    /// Write nothing for this row.
    Skip,
    /// Overwrite the mutable fields of an existing record.
    Update { existing_animal_id: DbId },
    /// Insert the row as a new, unrelated record.
    CreateNew,
}

/// What to do with a parent name that did not resolve uniquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "parent_action", rename_all = "snake_case")]
pub enum ParentAction {
    /// Leave the link empty.
    Skip,
    /// Link to a chosen existing record.
    Link { selected_animal_id: DbId },
    /// Create a minimal placeholder record and link to it.
    CreatePlaceholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateResolution {
    pub row_number: usize,
    #[serde(flatten)]
    pub action: DuplicateAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentResolution {
    pub row_number: usize,
    pub parent_field: ParentField,
    #[serde(flatten)]
    pub action: ParentAction,
}

/// One caller decision, as submitted.
///
/// On the wire the two kinds are told apart by their fields: parent
/// resolutions carry `parent_field`/`parent_action`, duplicate resolutions
/// carry `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowResolution {
    Parent(ParentResolution),
    Duplicate(DuplicateResolution),
}

impl RowResolution {
    pub fn row_number(&self) -> usize {
        match self {
            Self::Parent(p) => p.row_number,
            Self::Duplicate(d) => d.row_number,
        }
    }
}

/// The decisions that apply to a single row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowResolutions {
    pub duplicate: Option<DuplicateAction>,
    pub dam: Option<ParentAction>,
    pub sire: Option<ParentAction>,
}

impl RowResolutions {
    pub fn parent(&self, field: ParentField) -> Option<ParentAction> {
        match field {
            ParentField::Dam => self.dam,
            ParentField::Sire => self.sire,
        }
    }
}

/// Resolutions indexed by row number.
#[derive(Debug, Clone, Default)]
pub struct ResolutionSet {
    by_row: BTreeMap<usize, RowResolutions>,
}

impl ResolutionSet {
    /// Index submitted resolutions. A second duplicate resolution, or a
    /// second resolution for the same parent side, on one row is rejected.
    pub fn build(resolutions: &[RowResolution]) -> Result<Self, ImportError> {
        let mut by_row: BTreeMap<usize, RowResolutions> = BTreeMap::new();

        for resolution in resolutions {
            let entry = by_row.entry(resolution.row_number()).or_default();
            match resolution {
                RowResolution::Duplicate(d) => {
                    if entry.duplicate.is_some() {
                        return Err(ImportError::ConflictingResolutions(format!(
                            "row {} has more than one duplicate resolution",
                            d.row_number
                        )));
                    }
                    entry.duplicate = Some(d.action);
                }
                RowResolution::Parent(p) => {
                    let slot = match p.parent_field {
                        ParentField::Dam => &mut entry.dam,
                        ParentField::Sire => &mut entry.sire,
                    };
                    if slot.is_some() {
                        return Err(ImportError::ConflictingResolutions(format!(
                            "row {} has more than one {} resolution",
                            p.row_number, p.parent_field
                        )));
                    }
                    *slot = Some(p.action);
                }
            }
        }

        Ok(Self { by_row })
    }

    pub fn for_row(&self, row_number: usize) -> RowResolutions {
        self.by_row.get(&row_number).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_row.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn deserializes_duplicate_update() {
        let r: RowResolution =
            serde_json::from_value(json!({"row_number": 3, "action": "update", "existing_animal_id": 42}))
                .unwrap();
        assert_eq!(
            r,
            RowResolution::Duplicate(DuplicateResolution {
                row_number: 3,
                action: DuplicateAction::Update {
                    existing_animal_id: 42
                },
            })
        );
    }

    #[test]
    fn deserializes_duplicate_skip_and_create_new() {
        let r: RowResolution =
            serde_json::from_value(json!({"row_number": 1, "action": "skip"})).unwrap();
        assert_matches!(
            r,
            RowResolution::Duplicate(DuplicateResolution {
                action: DuplicateAction::Skip,
                ..
            })
        );
        let r: RowResolution =
            serde_json::from_value(json!({"row_number": 1, "action": "create_new"})).unwrap();
        assert_matches!(
            r,
            RowResolution::Duplicate(DuplicateResolution {
                action: DuplicateAction::CreateNew,
                ..
            })
        );
    }

    #[test]
    fn deserializes_parent_link() {
        let r: RowResolution = serde_json::from_value(json!({
            "row_number": 2,
            "parent_field": "dam",
            "parent_action": "link",
            "selected_animal_id": 7
        }))
        .unwrap();
        assert_eq!(
            r,
            RowResolution::Parent(ParentResolution {
                row_number: 2,
                parent_field: ParentField::Dam,
                action: ParentAction::Link {
                    selected_animal_id: 7
                },
            })
        );
    }

    #[test]
    fn update_without_id_is_rejected() {
        let r = serde_json::from_value::<RowResolution>(json!({"row_number": 1, "action": "update"}));
        assert!(r.is_err());
    }

    #[test]
    fn link_without_id_is_rejected() {
        let r = serde_json::from_value::<RowResolution>(json!({
            "row_number": 1,
            "parent_field": "sire",
            "parent_action": "link"
        }));
        assert!(r.is_err());
    }

    #[test]
    fn set_indexes_dam_and_sire_independently() {
        let set = ResolutionSet::build(&[
            RowResolution::Parent(ParentResolution {
                row_number: 4,
                parent_field: ParentField::Dam,
                action: ParentAction::Skip,
            }),
            RowResolution::Parent(ParentResolution {
                row_number: 4,
                parent_field: ParentField::Sire,
                action: ParentAction::CreatePlaceholder,
            }),
            RowResolution::Duplicate(DuplicateResolution {
                row_number: 4,
                action: DuplicateAction::CreateNew,
            }),
        ])
        .unwrap();

        let row = set.for_row(4);
        assert_eq!(row.dam, Some(ParentAction::Skip));
        assert_eq!(row.sire, Some(ParentAction::CreatePlaceholder));
        assert_eq!(row.duplicate, Some(DuplicateAction::CreateNew));
        assert_eq!(set.for_row(5), RowResolutions::default());
    }

    #[test]
    fn set_rejects_conflicting_resolutions() {
        let dup = RowResolution::Duplicate(DuplicateResolution {
            row_number: 1,
            action: DuplicateAction::Skip,
        });
        assert_matches!(
            ResolutionSet::build(&[dup.clone(), dup]),
            Err(ImportError::ConflictingResolutions(_))
        );

        let dam = RowResolution::Parent(ParentResolution {
            row_number: 1,
            parent_field: ParentField::Dam,
            action: ParentAction::Skip,
        });
        assert_matches!(
            ResolutionSet::build(&[dam.clone(), dam]),
            Err(ImportError::ConflictingResolutions(_))
        );
    }
}
