use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use herdbook_api::config::ServerConfig;
use herdbook_api::router::build_app_router;
use herdbook_api::state::{AppState, TenantStores};
use herdbook_core::import::memory::MemoryStore;
use herdbook_core::import::ImportStore;
use herdbook_core::types::DbId;

/// In-memory tenant stores, one [`MemoryStore`] per tenant id.
#[derive(Default)]
pub struct MemoryTenantStores {
    stores: Mutex<HashMap<DbId, MemoryStore>>,
}

impl MemoryTenantStores {
    /// The store for `tenant_id`, created empty on first use.
    pub fn store(&self, tenant_id: DbId) -> MemoryStore {
        self.stores
            .lock()
            .unwrap()
            .entry(tenant_id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl TenantStores for MemoryTenantStores {
    fn for_tenant(&self, tenant_id: DbId) -> Arc<dyn ImportStore> {
        Arc::new(self.store(tenant_id))
    }

    async fn healthy(&self) -> bool {
        true
    }
}

/// Build a test `ServerConfig` with safe defaults and a small row cap.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        import_max_rows: 10,
        import_max_body_bytes: 1024 * 1024,
    }
}

/// Build the full application router over in-memory stores, with the same
/// middleware stack production uses.
pub fn build_test_app(stores: Arc<MemoryTenantStores>) -> Router {
    let config = test_config();
    let state = AppState {
        config: Arc::new(config.clone()),
        stores,
    };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
