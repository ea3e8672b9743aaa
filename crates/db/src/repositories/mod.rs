//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that take
//! a `&mut PgConnection` first, so the same query runs on a pooled
//! connection or inside a transaction (`&mut *tx`). Every query is scoped
//! to a tenant.

pub mod animal_repo;
pub mod registry_repo;

pub use animal_repo::AnimalRepo;
pub use registry_repo::RegistryRepo;
