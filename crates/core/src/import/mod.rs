//! Spreadsheet import of animal records.
//!
//! Parsing and validation are pure. Duplicate detection and parent matching
//! read through the [`store`] traits, and execution writes one transaction
//! per row. Nothing in this module knows about a concrete database.

pub mod duplicates;
pub mod error;
pub mod executor;
pub mod memory;
pub mod parents;
pub mod parser;
pub mod preview;
pub mod resolution;
pub mod row;
pub mod store;
pub mod summary;

pub use error::ImportError;
pub use executor::execute_import;
pub use parser::ImportOptions;
pub use preview::preview_import;
pub use resolution::RowResolution;
pub use store::{AnimalLookup, ImportStore, RowTransaction, StoreError};
pub use summary::{ImportPreview, ImportSummary};
