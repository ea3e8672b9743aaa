use std::sync::Arc;

use async_trait::async_trait;
use herdbook_core::import::ImportStore;
use herdbook_core::types::DbId;
use herdbook_db::{DbPool, PgImportStore};

use crate::config::ServerConfig;

/// Hands out import stores scoped to one tenant.
#[async_trait]
pub trait TenantStores: Send + Sync {
    fn for_tenant(&self, tenant_id: DbId) -> Arc<dyn ImportStore>;

    /// Whether the backing store is reachable.
    async fn healthy(&self) -> bool;
}

/// Tenant stores backed by the shared Postgres pool.
#[derive(Debug, Clone)]
pub struct PgTenantStores {
    pool: DbPool,
}

impl PgTenantStores {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantStores for PgTenantStores {
    fn for_tenant(&self, tenant_id: DbId) -> Arc<dyn ImportStore> {
        Arc::new(PgImportStore::new(self.pool.clone(), tenant_id))
    }

    async fn healthy(&self) -> bool {
        herdbook_db::health_check(&self.pool).await.is_ok()
    }
}

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Per-tenant record stores.
    pub stores: Arc<dyn TenantStores>,
}
