//! Delimited-text parsing and per-row validation.
//!
//! Turns decoded spreadsheet text into an ordered list of [`ParsedRow`]s.
//! Only file-level problems (no header, missing required columns, no data
//! rows, too many rows) abort; every row-level violation is recorded on the
//! row itself so a single pass reports all of them. Parsing is deterministic:
//! identical input always yields identical rows, statuses and messages.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::error::ImportError;
use super::row::{AnimalRow, ParentLinks, ParsedRow, RawRow, RowError, RowStatus};
use crate::animal::{vocabulary_list, AnimalStatus, Sex, Species};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_NOTES_LENGTH: usize = 5000;

/// Default cap on data rows per import. Larger files must be split by the caller.
pub const DEFAULT_MAX_ROWS: usize = 5000;

pub const BIRTH_DATE_FORMAT: &str = "YYYY-MM-DD";

static BIRTH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static regex is valid"));

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Knobs for a single preview or execute call.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Birth dates strictly after this day are rejected.
    pub today: NaiveDate,
    pub max_rows: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            today: chrono::Utc::now().date_naive(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl ImportOptions {
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Recognised header columns. Header cells must match the spelling exactly
/// (surrounding whitespace is ignored).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Name,
    Species,
    Sex,
    BirthDate,
    Microchip,
    Breed,
    DamName,
    SireName,
    RegistryName,
    RegistryNumber,
    Status,
    Notes,
}

impl Column {
    pub const ALL: &'static [Column] = &[
        Self::Name,
        Self::Species,
        Self::Sex,
        Self::BirthDate,
        Self::Microchip,
        Self::Breed,
        Self::DamName,
        Self::SireName,
        Self::RegistryName,
        Self::RegistryNumber,
        Self::Status,
        Self::Notes,
    ];

    pub const REQUIRED: &'static [Column] = &[Self::Name, Self::Species, Self::Sex];

    pub fn header(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Species => "Species",
            Self::Sex => "Sex",
            Self::BirthDate => "Birth Date",
            Self::Microchip => "Microchip",
            Self::Breed => "Breed",
            Self::DamName => "Dam Name",
            Self::SireName => "Sire Name",
            Self::RegistryName => "Registry Name",
            Self::RegistryNumber => "Registry Number",
            Self::Status => "Status",
            Self::Notes => "Notes",
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        let header = header.trim();
        Self::ALL.iter().copied().find(|c| c.header() == header)
    }

    fn slot<'a>(&self, raw: &'a mut RawRow) -> &'a mut Option<String> {
        match self {
            Self::Name => &mut raw.name,
            Self::Species => &mut raw.species,
            Self::Sex => &mut raw.sex,
            Self::BirthDate => &mut raw.birth_date,
            Self::Microchip => &mut raw.microchip,
            Self::Breed => &mut raw.breed,
            Self::DamName => &mut raw.dam_name,
            Self::SireName => &mut raw.sire_name,
            Self::RegistryName => &mut raw.registry_name,
            Self::RegistryNumber => &mut raw.registry_number,
            Self::Status => &mut raw.status,
            Self::Notes => &mut raw.notes,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Tab when the header line holds tabs but no commas, comma otherwise.
pub fn detect_delimiter(text: &str) -> u8 {
    let header_line = text.lines().next().unwrap_or("");
    if header_line.contains('\t') && !header_line.contains(',') {
        b'\t'
    } else {
        b','
    }
}

/// Parse and validate an import file.
///
/// Returns one [`ParsedRow`] per non-blank data row, in input order, with
/// `row_number` counting from 1. Rows are not enriched against the record
/// store here; see [`super::preview::enrich_row`].
pub fn parse_import(text: &str, options: &ImportOptions) -> Result<Vec<ParsedRow>, ImportError> {
    let raw_rows = read_raw_rows(text)?;

    if raw_rows.is_empty() {
        return Err(ImportError::NoDataRows);
    }
    if raw_rows.len() > options.max_rows {
        return Err(ImportError::TooManyRows {
            found: raw_rows.len(),
            max: options.max_rows,
        });
    }

    Ok(raw_rows
        .into_iter()
        .enumerate()
        .map(|(i, raw)| validate_row(i + 1, raw, options))
        .collect())
}

/// Split the text into trimmed raw rows, checking the header on the way.
fn read_raw_rows(text: &str) -> Result<Vec<RawRow>, ImportError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(ImportError::MissingHeader);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let header = match records.next() {
        Some(record) => record.map_err(|e| ImportError::Malformed(e.to_string()))?,
        None => return Err(ImportError::MissingHeader),
    };
    let headers: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::MissingHeader);
    }

    // First occurrence of a known header wins; repeats are kept as extras.
    let mut columns: Vec<Option<Column>> = Vec::with_capacity(headers.len());
    for h in &headers {
        let column = Column::from_header(h).filter(|c| !columns.contains(&Some(*c)));
        columns.push(column);
    }

    let missing: Vec<String> = Column::REQUIRED
        .iter()
        .filter(|c| !columns.contains(&Some(**c)))
        .map(|c| c.header().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    for (i, record) in records.enumerate() {
        let record = record.map_err(|e| {
            ImportError::Malformed(format!("record {} after the header: {e}", i + 1))
        })?;

        let mut raw = RawRow::default();
        for (idx, cell) in record.iter().enumerate() {
            let value = cell.trim();
            if value.is_empty() {
                continue;
            }
            match columns.get(idx).copied().flatten() {
                Some(column) => *column.slot(&mut raw) = Some(value.to_string()),
                None => {
                    let key = match headers.get(idx) {
                        Some(h) if !h.is_empty() => h.clone(),
                        _ => format!("column_{}", idx + 1),
                    };
                    raw.extra.insert(key, value.to_string());
                }
            }
        }

        if !raw.is_blank() {
            rows.push(raw);
        }
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate one raw row. Collects every violation; never auto-corrects.
pub fn validate_row(row_number: usize, raw: RawRow, options: &ImportOptions) -> ParsedRow {
    let mut errors = Vec::new();

    let name = match raw.name.as_deref() {
        None => {
            errors.push(RowError::new("Name", "Name is required"));
            None
        }
        Some(n) if n.chars().count() > MAX_NAME_LENGTH => {
            errors.push(RowError::new(
                "Name",
                format!("Name must be at most {MAX_NAME_LENGTH} characters"),
            ));
            None
        }
        Some(n) => Some(n.to_string()),
    };

    let species = match raw.species.as_deref() {
        None => {
            errors.push(RowError::new("Species", "Species is required"));
            None
        }
        Some(s) => match s.parse::<Species>() {
            Ok(species) => Some(species),
            Err(_) => {
                errors.push(RowError::new(
                    "Species",
                    format!(
                        "Species '{s}' is not recognised. Must be one of: {}",
                        vocabulary_list(Species::ALL, Species::as_str)
                    ),
                ));
                None
            }
        },
    };

    let sex = match raw.sex.as_deref() {
        None => {
            errors.push(RowError::new("Sex", "Sex is required"));
            None
        }
        Some(s) => match s.parse::<Sex>() {
            Ok(sex) => Some(sex),
            Err(_) => {
                errors.push(RowError::new(
                    "Sex",
                    format!(
                        "Sex '{s}' is not recognised. Must be one of: {}",
                        vocabulary_list(Sex::ALL, Sex::as_str)
                    ),
                ));
                None
            }
        },
    };

    let birth_date = match raw.birth_date.as_deref() {
        None => None,
        Some(s) => match parse_birth_date(s, options.today) {
            Ok(date) => Some(date),
            Err(message) => {
                errors.push(RowError::new("Birth Date", message));
                None
            }
        },
    };

    let status = match raw.status.as_deref() {
        None => AnimalStatus::default(),
        Some(s) => s.parse::<AnimalStatus>().unwrap_or_else(|_| {
            errors.push(RowError::new(
                "Status",
                format!(
                    "Status '{s}' is not recognised. Must be one of: {}",
                    vocabulary_list(AnimalStatus::ALL, AnimalStatus::as_str)
                ),
            ));
            AnimalStatus::default()
        }),
    };

    if let Some(notes) = raw.notes.as_deref() {
        if notes.chars().count() > MAX_NOTES_LENGTH {
            errors.push(RowError::new(
                "Notes",
                format!("Notes must be at most {MAX_NOTES_LENGTH} characters"),
            ));
        }
    }

    if raw.registry_number.is_some() && raw.registry_name.is_none() {
        errors.push(RowError::new(
            "Registry Name",
            "Registry Name is required when Registry Number is provided",
        ));
    }

    let animal = match (name, species, sex) {
        (Some(name), Some(species), Some(sex)) if errors.is_empty() => Some(AnimalRow {
            name,
            species,
            sex,
            birth_date,
            microchip: raw.microchip.clone(),
            breed: raw.breed.clone(),
            dam_name: raw.dam_name.clone(),
            sire_name: raw.sire_name.clone(),
            registry_name: raw.registry_name.clone(),
            registry_number: raw.registry_number.clone(),
            status,
            status_provided: raw.status.is_some(),
            notes: raw.notes.clone(),
        }),
        _ => None,
    };

    ParsedRow {
        row_number,
        raw,
        status: if animal.is_some() {
            RowStatus::Valid
        } else {
            RowStatus::Error
        },
        animal,
        errors,
        warnings: Vec::new(),
        parent_links: ParentLinks::default(),
    }
}

fn parse_birth_date(s: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    if !BIRTH_DATE_RE.is_match(s) {
        return Err(format!(
            "Birth Date '{s}' must use the {BIRTH_DATE_FORMAT} format"
        ));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Birth Date '{s}' is not a valid calendar date"))?;
    if date > today {
        return Err(format!("Birth Date '{s}' cannot be in the future"));
    }
    Ok(date)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn options() -> ImportOptions {
        ImportOptions::default().with_today(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    fn parse(text: &str) -> Vec<ParsedRow> {
        parse_import(text, &options()).expect("file should parse")
    }

    fn single(text: &str) -> ParsedRow {
        let mut rows = parse(text);
        assert_eq!(rows.len(), 1);
        rows.remove(0)
    }

    fn messages(row: &ParsedRow) -> Vec<&str> {
        row.errors.iter().map(|e| e.message.as_str()).collect()
    }

    // -- Structure -----------------------------------------------------------

    #[test]
    fn empty_input_is_missing_header() {
        assert_matches!(parse_import("", &options()), Err(ImportError::MissingHeader));
        assert_matches!(
            parse_import("  \n\n", &options()),
            Err(ImportError::MissingHeader)
        );
    }

    #[test]
    fn header_only_is_structural_failure() {
        assert_matches!(
            parse_import("Name,Species,Sex\n", &options()),
            Err(ImportError::NoDataRows)
        );
    }

    #[test]
    fn missing_required_columns_are_listed() {
        let err = parse_import("Name,Breed\nDuke,Beagle\n", &options()).unwrap_err();
        assert_matches!(err, ImportError::MissingColumns(ref cols) if cols == &["Species", "Sex"]);
    }

    #[test]
    fn header_spelling_is_exact() {
        assert_matches!(
            parse_import("name,species,sex\nDuke,DOG,MALE\n", &options()),
            Err(ImportError::MissingColumns(_))
        );
    }

    #[test]
    fn too_many_rows_rejected() {
        let text = "Name,Species,Sex\nA,DOG,MALE\nB,DOG,MALE\nC,DOG,MALE\n";
        let err = parse_import(text, &options().with_max_rows(2)).unwrap_err();
        assert_matches!(err, ImportError::TooManyRows { found: 3, max: 2 });
    }

    // -- Row numbering and determinism --------------------------------------

    #[test]
    fn row_numbers_are_one_based_and_increasing() {
        let rows = parse("Name,Species,Sex\nA,DOG,MALE\nB,CAT,FEMALE\n,,\nC,GOAT,MALE\n");
        let numbers: Vec<usize> = rows.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(rows[2].raw.name.as_deref(), Some("C"));
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = "Name,Species,Sex,Birth Date\nA,DOG,MALE,2099-01-01\nB,llama,FEMALE,\n";
        let first = parse(text);
        let second = parse(text);
        assert_eq!(first, second);
    }

    // -- Quoting and delimiters ---------------------------------------------

    #[test]
    fn quoted_fields_with_separators_and_newlines() {
        let text = "Name,Species,Sex,Notes\n\"Duke, Jr.\",DOG,MALE,\"line one\nline two\"\nRex,DOG,MALE,\n";
        let rows = parse(text);
        assert_eq!(rows.len(), 2);
        let duke = rows[0].animal.as_ref().unwrap();
        assert_eq!(duke.name, "Duke, Jr.");
        assert_eq!(duke.notes.as_deref(), Some("line one\nline two"));
        assert_eq!(rows[1].row_number, 2);
    }

    #[test]
    fn tab_separated_input_is_detected() {
        let row = single("Name\tSpecies\tSex\tBreed\nDuke\tDOG\tMALE\tBeagle, lemon\n");
        let animal = row.animal.unwrap();
        assert_eq!(animal.breed.as_deref(), Some("Beagle, lemon"));
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let row = single("\u{feff}Name,Species,Sex\nDuke,DOG,MALE\n");
        assert_eq!(row.status, RowStatus::Valid);
    }

    #[test]
    fn unknown_columns_are_kept_as_extras() {
        let row = single("Name,Colour,Species,Sex\nDuke,red,DOG,MALE\n");
        assert_eq!(row.status, RowStatus::Valid);
        assert_eq!(row.raw.extra.get("Colour").map(String::as_str), Some("red"));
    }

    #[test]
    fn short_records_leave_missing_cells_blank() {
        let row = single("Name,Species,Sex,Breed\nDuke,DOG,MALE\n");
        assert_eq!(row.status, RowStatus::Valid);
        assert!(row.animal.unwrap().breed.is_none());
    }

    // -- Field rules ----------------------------------------------------------

    #[test]
    fn enums_normalize_case_insensitively() {
        let row = single("Name,Species,Sex,Status\n  Bella  ,dog,female,breeding\n");
        let animal = row.animal.unwrap();
        assert_eq!(animal.name, "Bella");
        assert_eq!(animal.species, Species::Dog);
        assert_eq!(animal.sex, Sex::Female);
        assert_eq!(animal.status, AnimalStatus::Breeding);
        assert!(animal.status_provided);
    }

    #[test]
    fn status_defaults_to_active() {
        let animal = single("Name,Species,Sex\nDuke,DOG,MALE\n").animal.unwrap();
        assert_eq!(animal.status, AnimalStatus::Active);
        assert!(!animal.status_provided);
    }

    #[test]
    fn missing_required_values_each_reported() {
        let row = single("Name,Species,Sex,Breed\n,,,Beagle\n");
        assert_eq!(row.status, RowStatus::Error);
        assert_eq!(
            messages(&row),
            vec!["Name is required", "Species is required", "Sex is required"]
        );
        assert!(row.animal.is_none());
    }

    #[test]
    fn invalid_enums_name_allowed_values() {
        let row = single("Name,Species,Sex,Status\nDuke,llama,X,lost\n");
        assert_eq!(row.errors.len(), 3);
        assert!(row.errors[0].message.contains("DOG, CAT, HORSE, GOAT, RABBIT, SHEEP"));
        assert!(row.errors[1].message.contains("FEMALE, MALE"));
        assert!(row.errors[2].message.contains("PROSPECT"));
    }

    #[test]
    fn name_length_limit() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        let row = single(&format!("Name,Species,Sex\n{long},DOG,MALE\n"));
        assert_eq!(row.status, RowStatus::Error);

        let exact = "x".repeat(MAX_NAME_LENGTH);
        let row = single(&format!("Name,Species,Sex\n{exact},DOG,MALE\n"));
        assert_eq!(row.status, RowStatus::Valid);
    }

    #[test]
    fn notes_length_limit() {
        let long = "n".repeat(MAX_NOTES_LENGTH + 1);
        let row = single(&format!("Name,Species,Sex,Notes\nDuke,DOG,MALE,{long}\n"));
        assert_eq!(row.errors[0].field, "Notes");
    }

    #[test]
    fn birth_date_rules() {
        let valid = single("Name,Species,Sex,Birth Date\nDuke,DOG,MALE,2023-05-15\n");
        assert_eq!(valid.status, RowStatus::Valid);
        assert_eq!(
            valid.animal.unwrap().birth_date,
            NaiveDate::from_ymd_opt(2023, 5, 15)
        );

        let future = single("Name,Species,Sex,Birth Date\nDuke,DOG,MALE,2099-01-01\n");
        assert!(future.errors[0].message.contains("future"));

        let wrong_format = single("Name,Species,Sex,Birth Date\nDuke,DOG,MALE,05/15/2023\n");
        assert!(wrong_format.errors[0].message.contains("YYYY-MM-DD"));

        let impossible = single("Name,Species,Sex,Birth Date\nDuke,DOG,MALE,2023-02-30\n");
        assert!(impossible.errors[0].message.contains("calendar"));
    }

    #[test]
    fn birth_date_on_today_is_accepted() {
        let row = single("Name,Species,Sex,Birth Date\nDuke,DOG,MALE,2024-06-01\n");
        assert_eq!(row.status, RowStatus::Valid);
    }

    #[test]
    fn registry_number_requires_registry_name() {
        let row = single("Name,Species,Sex,Registry Number\nDuke,DOG,MALE,AKC-1\n");
        assert_eq!(row.status, RowStatus::Error);
        assert_eq!(row.errors[0].field, "Registry Name");

        let row = single("Name,Species,Sex,Registry Name\nDuke,DOG,MALE,AKC\n");
        assert_eq!(row.status, RowStatus::Valid);
    }

    #[test]
    fn delimiter_detection() {
        assert_eq!(detect_delimiter("Name\tSpecies\tSex\n"), b'\t');
        assert_eq!(detect_delimiter("Name,Species,Sex\n"), b',');
        assert_eq!(detect_delimiter("Name,Notes\twith tab\n"), b',');
    }
}
