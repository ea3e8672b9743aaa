//! Parent (dam/sire) name matching.
//!
//! A parent name resolves automatically only when exactly one record of the
//! row's species and the side's sex carries that name (case-insensitive).
//! Otherwise the row gets a `parent_not_found` warning listing up to
//! [`MAX_SUGGESTIONS`] candidates ranked by normalized edit-distance
//! similarity.

use super::row::{AnimalRow, MatchCandidate, ParentField, ParsedRow, RowStatus, RowWarning};
use super::store::{AnimalLookup, StoreError};
use crate::animal::AnimalRecord;
use crate::types::DbId;

/// Candidates must score strictly above this to be suggested.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

pub const MAX_SUGGESTIONS: usize = 5;

/// Normalized Levenshtein similarity on lower-cased names:
/// `(max_len - distance) / max_len`, clamped to `[0, 1]`.
///
/// Two empty names are identical (1.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(&a, &b);
    ((max_len as f64 - distance as f64) / max_len as f64).clamp(0.0, 1.0)
}

/// Best similarity achievable given only the lengths. The edit distance is
/// at least the length difference.
fn similarity_upper_bound(a_len: usize, b_len: usize) -> f64 {
    let max_len = a_len.max(b_len);
    if max_len == 0 {
        return 1.0;
    }
    (max_len - a_len.abs_diff(b_len)) as f64 / max_len as f64
}

/// Outcome of matching one parent name against a candidate pool.
#[derive(Debug, Clone, PartialEq)]
pub enum ParentMatch {
    /// Exactly one record has the name.
    Exact(DbId),
    /// No unique exact match; ranked suggestions (possibly empty).
    Suggestions(Vec<MatchCandidate>),
}

/// Rank `pool` against `name`. The pool must already be restricted to the
/// eligible species and sex.
pub fn match_parent(name: &str, pool: &[AnimalRecord]) -> ParentMatch {
    let exact: Vec<&AnimalRecord> = pool.iter().filter(|r| same_name(name, &r.name)).collect();
    if let [only] = exact.as_slice() {
        return ParentMatch::Exact(only.id);
    }
    ParentMatch::Suggestions(rank_candidates(name, pool))
}

/// Whether two names count as an exact parent-name match.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Up to [`MAX_SUGGESTIONS`] records of `pool` scoring above the threshold,
/// best first.
pub fn rank_candidates(name: &str, pool: &[AnimalRecord]) -> Vec<MatchCandidate> {
    let wanted = name.trim().to_lowercase();
    let wanted_len = wanted.chars().count();
    let mut candidates: Vec<MatchCandidate> = pool
        .iter()
        .filter(|r| {
            similarity_upper_bound(wanted_len, r.name.trim().chars().count())
                > SIMILARITY_THRESHOLD
        })
        .filter_map(|r| {
            let score = similarity(&wanted, r.name.trim());
            (score > SIMILARITY_THRESHOLD).then(|| MatchCandidate {
                id: r.id,
                name: r.name.clone(),
                species: r.species,
                sex: r.sex,
                breed: r.breed.clone(),
                birth_date: r.birth_date,
                similarity: score,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.truncate(MAX_SUGGESTIONS);
    candidates
}

/// Resolve one side of a row against the store.
pub async fn resolve_parent<L>(
    lookup: &mut L,
    row: &AnimalRow,
    field: ParentField,
) -> Result<Option<ParentMatch>, StoreError>
where
    L: AnimalLookup + ?Sized,
{
    let Some(name) = row.parent_name(field) else {
        return Ok(None);
    };
    let pool = lookup
        .list_by_species_and_sex(row.species, field.required_sex())
        .await?;
    Ok(Some(match_parent(name, &pool)))
}

/// Match both parent names of a valid row, recording exact links and
/// downgrading the row for each side that needs a decision.
pub async fn match_parents<L>(lookup: &mut L, row: &mut ParsedRow) -> Result<(), StoreError>
where
    L: AnimalLookup + ?Sized,
{
    if row.status == RowStatus::Error {
        return Ok(());
    }
    let Some(animal) = row.animal.clone() else {
        return Ok(());
    };

    for field in [ParentField::Dam, ParentField::Sire] {
        match resolve_parent(lookup, &animal, field).await? {
            None => {}
            Some(ParentMatch::Exact(id)) => row.parent_links.set(field, Some(id)),
            Some(ParentMatch::Suggestions(suggestions)) => {
                tracing::debug!(
                    row_number = row.row_number,
                    parent_field = field.as_str(),
                    suggestions = suggestions.len(),
                    "Parent name has no unique exact match"
                );
                row.push_warning(RowWarning::ParentNotFound {
                    parent_field: field,
                    parent_name: animal.parent_name(field).unwrap_or_default().to_string(),
                    suggestions,
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animal::{AnimalStatus, Sex, Species};

    fn dam(id: DbId, name: &str) -> AnimalRecord {
        AnimalRecord {
            id,
            name: name.into(),
            species: Species::Dog,
            sex: Sex::Female,
            birth_date: None,
            microchip: None,
            breed: None,
            status: AnimalStatus::Active,
            notes: None,
            dam_id: None,
            sire_id: None,
        }
    }

    fn suggestions(m: ParentMatch) -> Vec<MatchCandidate> {
        match m {
            ParentMatch::Suggestions(s) => s,
            other => panic!("expected suggestions, got {other:?}"),
        }
    }

    // -- Similarity ----------------------------------------------------------

    #[test]
    fn similarity_of_daisy_and_daisy_mae() {
        let score = similarity("Daisy", "Daisy Mae");
        assert!((score - 5.0 / 9.0).abs() < 1e-9);
        assert!(score <= SIMILARITY_THRESHOLD);
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("Daisy", "daisy"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("abc", ""), 0.0);
    }

    #[test]
    fn upper_bound_never_below_actual_score() {
        for (a, b) in [("Daisy", "Daisy Mae"), ("Rex", "Rexie"), ("Bo", "Bonnie")] {
            let bound = similarity_upper_bound(a.chars().count(), b.chars().count());
            assert!(bound >= similarity(a, b));
        }
    }

    // -- Matching ------------------------------------------------------------

    #[test]
    fn unique_exact_match_links() {
        let pool = vec![dam(1, "Daisy"), dam(2, "Daisy Mae")];
        assert_eq!(match_parent("daisy", &pool), ParentMatch::Exact(1));
    }

    #[test]
    fn ambiguous_exact_match_falls_back_to_suggestions() {
        let pool = vec![dam(1, "Daisy"), dam(2, "DAISY")];
        let s = suggestions(match_parent("Daisy", &pool));
        assert_eq!(s.len(), 2);
        assert!(s.iter().all(|c| c.similarity == 1.0));
    }

    #[test]
    fn suggestions_ranked_descending_and_filtered() {
        // "Daisie" ~ 0.67, "Dasy" = 0.8, "Daisy Mae" ~ 0.56 (excluded).
        let pool = vec![dam(1, "Daisie"), dam(2, "Dasy"), dam(3, "Daisy Mae")];
        let s = suggestions(match_parent("Daisy", &pool));
        let ids: Vec<DbId> = s.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(s.iter().all(|c| c.similarity > SIMILARITY_THRESHOLD));
    }

    #[test]
    fn suggestions_capped_at_five() {
        let pool: Vec<AnimalRecord> = ["Daisyb", "Daisyc", "Daisyd", "Daisye", "Daisyf", "Daisyg"]
            .iter()
            .enumerate()
            .map(|(i, n)| dam(i as DbId + 1, n))
            .collect();
        let s = suggestions(match_parent("Daisy", &pool));
        assert_eq!(s.len(), MAX_SUGGESTIONS);
        // Equal scores fall back to name order.
        assert_eq!(s[0].name, "Daisyb");
    }

    #[test]
    fn no_candidates_yields_empty_suggestions() {
        let s = suggestions(match_parent("Daisy", &[]));
        assert!(s.is_empty());
    }
}
