//! Shared application state. Everything is injected, so tests build a fresh state (and a
//! fresh pool cache) per case.

use crate::pool::{PgConnector, PoolConnector, TenantPoolManager};
use crate::provision::{PgDatabaseAdmin, Provisioner, TenantDatabaseAdmin};
use crate::registry::{PgTenantRegistry, TenantStore};
use crate::resolver::TenantResolver;
use crate::settings::Settings;
use sqlx::PgPool;
use std::sync::Arc;

pub struct AppState<C: PoolConnector = PgConnector> {
    pub registry: Arc<dyn TenantStore>,
    pub pools: Arc<TenantPoolManager<C>>,
    pub admin: Arc<dyn TenantDatabaseAdmin<Pool = C::Pool>>,
    pub settings: Arc<Settings>,
}

impl<C: PoolConnector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            pools: self.pools.clone(),
            admin: self.admin.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<C: PoolConnector> AppState<C> {
    pub fn new(
        registry: Arc<dyn TenantStore>,
        connector: C,
        admin: Arc<dyn TenantDatabaseAdmin<Pool = C::Pool>>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            pools: Arc::new(TenantPoolManager::new(connector)),
            admin,
            settings: Arc::new(settings),
        }
    }

    pub fn resolver(&self) -> TenantResolver<'_, C> {
        TenantResolver::new(
            self.registry.as_ref(),
            &self.pools,
            &self.settings.default_subdomain,
        )
    }

    pub fn provisioner(&self) -> Provisioner<C> {
        Provisioner::new(
            self.registry.clone(),
            self.pools.clone(),
            self.admin.clone(),
            self.settings.retention,
        )
    }
}

impl AppState<PgConnector> {
    /// Production wiring: registry and database admin on the control-plane pool, tenant
    /// pools on the same server.
    pub fn postgres(control: PgPool, settings: Settings) -> Self {
        let connector = PgConnector::new(settings.database_url.clone(), settings.tenant_pool.clone());
        AppState::new(
            Arc::new(PgTenantRegistry::new(control.clone())),
            connector,
            Arc::new(PgDatabaseAdmin::new(control)),
            settings,
        )
    }
}
