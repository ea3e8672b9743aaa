//! Request handlers, one module per resource.

pub mod animal_import;
