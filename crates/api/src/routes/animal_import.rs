//! Route definitions for spreadsheet import of animal records.
//!
//! Mounted at `/tenants/{tenant_id}/animals/import` by `api_routes()`.

use axum::routing::post;
use axum::Router;

use crate::handlers::animal_import;
use crate::state::AppState;

/// Animal import routes.
///
/// ```text
/// POST   /preview    -> preview_import
/// POST   /execute    -> execute_import
/// ```
pub fn animal_import_router() -> Router<AppState> {
    Router::new()
        .route("/preview", post(animal_import::preview_import))
        .route("/execute", post(animal_import::execute_import))
}
