use super::store::StoreError;

/// Failures that abort an entire preview or execute call.
///
/// Row-scoped problems never surface here; they are recorded on the row
/// (preview) or in the summary (execute).
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Import file is empty or has no header row")]
    MissingHeader,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Import file contains no data rows")]
    NoDataRows,

    #[error("Import file has {found} data rows; at most {max} are accepted per import")]
    TooManyRows { found: usize, max: usize },

    #[error("Malformed delimited text: {0}")]
    Malformed(String),

    #[error("Conflicting resolutions: {0}")]
    ConflictingResolutions(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Whether the failure is caused by the submitted file or resolutions
    /// rather than by the record store.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
