pub mod animal_import;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /tenants/{tenant_id}/animals/import/preview      parse + classify (POST)
/// /tenants/{tenant_id}/animals/import/execute      apply resolutions, write (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest(
        "/tenants/{tenant_id}/animals/import",
        animal_import::animal_import_router(),
    )
}
