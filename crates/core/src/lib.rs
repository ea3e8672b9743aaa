//! Domain logic for the herdbook record service.
//!
//! No database or HTTP dependencies live here; storage is reached through
//! the traits in [`import::store`].

pub mod animal;
pub mod error;
pub mod import;
pub mod types;
