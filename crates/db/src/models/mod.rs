//! Row models for the record tables.
//!
//! Vocabulary columns are stored as TEXT and converted to the core enums
//! when a row leaves the database layer.

pub mod animal;
pub mod registry;
