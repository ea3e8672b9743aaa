//! Handlers for the two-phase animal spreadsheet import.
//!
//! Preview and execute are stateless: both receive the full file text, and
//! execute re-parses it rather than trusting an earlier preview.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use herdbook_core::import::{
    self, ImportError, ImportOptions, ImportPreview, ImportSummary, RowResolution,
};
use herdbook_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Request body for previewing an import.
#[derive(Debug, Deserialize)]
pub struct PreviewImportRequest {
    /// Delimited text, header row first.
    pub content: String,
}

/// Request body for executing an import.
#[derive(Debug, Deserialize)]
pub struct ExecuteImportRequest {
    pub content: String,
    #[serde(default)]
    pub resolutions: Vec<RowResolution>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_tenant(tenant_id: DbId) -> AppResult<()> {
    if tenant_id <= 0 {
        return Err(AppError::BadRequest(format!(
            "tenant_id must be positive, got {tenant_id}"
        )));
    }
    Ok(())
}

fn import_options(state: &AppState) -> ImportOptions {
    ImportOptions::default().with_max_rows(state.config.import_max_rows)
}

fn log_failure(tenant_id: DbId, err: &ImportError) {
    if err.is_client_error() {
        tracing::info!(tenant_id, error = %err, "Import rejected");
    } else {
        tracing::error!(tenant_id, error = %err, "Import failed");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /tenants/{tenant_id}/animals/import/preview
///
/// Parse and classify every row without writing anything.
pub async fn preview_import(
    State(state): State<AppState>,
    Path(tenant_id): Path<DbId>,
    Json(input): Json<PreviewImportRequest>,
) -> AppResult<Json<DataResponse<ImportPreview>>> {
    ensure_tenant(tenant_id)?;
    let store = state.stores.for_tenant(tenant_id);

    let preview = import::preview_import(store.as_ref(), &input.content, &import_options(&state))
        .await
        .inspect_err(|err| log_failure(tenant_id, err))?;

    tracing::info!(
        tenant_id,
        total = preview.summary.total_rows,
        warnings = preview.summary.warning_rows,
        errors = preview.summary.error_rows,
        "Import previewed"
    );
    Ok(Json(DataResponse { data: preview }))
}

/// POST /tenants/{tenant_id}/animals/import/execute
///
/// Re-parse the file, apply the caller's resolutions and write row by row.
pub async fn execute_import(
    State(state): State<AppState>,
    Path(tenant_id): Path<DbId>,
    Json(input): Json<ExecuteImportRequest>,
) -> AppResult<Json<DataResponse<ImportSummary>>> {
    ensure_tenant(tenant_id)?;
    let store = state.stores.for_tenant(tenant_id);

    let summary = import::execute_import(
        store.as_ref(),
        &input.content,
        &input.resolutions,
        &import_options(&state),
    )
    .await
    .inspect_err(|err| log_failure(tenant_id, err))?;

    tracing::info!(
        tenant_id,
        imported = summary.imported,
        updated = summary.updated,
        skipped = summary.skipped,
        errors = summary.errors,
        "Import executed"
    );
    Ok(Json(DataResponse { data: summary }))
}
