//! Tenant connection pool manager: one lazily created, bounded pool per tenant database.
//!
//! The cache maps a database identifier to a once-cell holding the pool. Lookups take the
//! shared lock; a miss takes the exclusive lock and inserts an empty cell if nobody beat
//! us to it. Construction then happens inside the cell, outside the map lock, so exactly
//! one caller builds a given tenant's pool while the others wait on that cell, and pools
//! for different tenants are built concurrently. A failed or cancelled construction
//! leaves the cell empty: nothing is negatively cached, the next caller retries.

use crate::error::AppError;
use crate::settings::{connect_options_for, PoolSettings};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::OnceCell;

/// Builds and tears down the physical pool for one tenant database.
#[async_trait]
pub trait PoolConnector: Send + Sync + 'static {
    type Pool: Clone + Send + Sync + 'static;

    /// Open a pool and verify the database is reachable.
    async fn connect(&self, db_name: &str) -> Result<Self::Pool, AppError>;

    async fn close(&self, pool: Self::Pool);
}

/// [`PoolConnector`] for PostgreSQL tenant databases living next to the control-plane
/// database (same server and credentials).
#[derive(Clone, Debug)]
pub struct PgConnector {
    base_url: String,
    settings: PoolSettings,
}

impl PgConnector {
    pub fn new(base_url: impl Into<String>, settings: PoolSettings) -> Self {
        Self {
            base_url: base_url.into(),
            settings,
        }
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .min_connections(self.settings.min_connections)
            .idle_timeout(self.settings.idle_timeout)
            .max_lifetime(self.settings.max_lifetime)
            .acquire_timeout(self.settings.acquire_timeout)
    }
}

#[async_trait]
impl PoolConnector for PgConnector {
    type Pool = PgPool;

    async fn connect(&self, db_name: &str) -> Result<PgPool, AppError> {
        let options = connect_options_for(&self.base_url, db_name)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        self.options()
            .connect_with(options)
            .await
            .map_err(|e| AppError::PoolUnavailable(format!("{}: {}", db_name, e)))
    }

    async fn close(&self, pool: PgPool) {
        pool.close().await;
    }
}

type PoolCell<P> = Arc<OnceCell<P>>;

/// Value of a detached cell once any construction in flight on it has finished. Never
/// starts a construction itself.
async fn settled<P: Clone>(cell: &OnceCell<P>) -> Option<P> {
    cell.get_or_try_init(|| async { Err::<P, ()>(()) })
        .await
        .ok()
        .cloned()
}

/// Cache of live tenant pools keyed by database identifier. Construct one per process
/// (or per test) and share it behind an `Arc`.
pub struct TenantPoolManager<C: PoolConnector> {
    connector: C,
    pools: RwLock<HashMap<String, PoolCell<C::Pool>>>,
}

impl<C: PoolConnector> TenantPoolManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            pools: RwLock::new(HashMap::new()),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Existing pool for `db_name`, or a newly constructed one. Concurrent first calls for
    /// the same identifier construct exactly one pool and all receive it.
    pub async fn get_pool(&self, db_name: &str) -> Result<C::Pool, AppError> {
        let cell = self.cell(db_name);
        if let Some(pool) = cell.get() {
            return Ok(pool.clone());
        }
        let pool = cell
            .get_or_try_init(|| async {
                let pool = self.connector.connect(db_name).await;
                match &pool {
                    Ok(_) => tracing::info!(db = db_name, "tenant pool created"),
                    Err(e) => tracing::warn!(db = db_name, error = %e, "tenant pool construction failed"),
                }
                pool
            })
            .await?;
        Ok(pool.clone())
    }

    fn cell(&self, db_name: &str) -> PoolCell<C::Pool> {
        {
            let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cell) = pools.get(db_name) {
                return cell.clone();
            }
        }
        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check under the exclusive lock: another caller may have inserted meanwhile.
        pools
            .entry(db_name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Close and forget the pool for one database. Returns whether a live pool was closed.
    /// A construction still in flight on the removed cell is waited for and its pool
    /// closed as well.
    pub async fn evict(&self, db_name: &str) -> bool {
        let cell = {
            let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
            pools.remove(db_name)
        };
        let Some(cell) = cell else {
            return false;
        };
        match settled(&cell).await {
            Some(pool) => {
                self.connector.close(pool).await;
                tracing::info!(db = db_name, "tenant pool closed");
                true
            }
            None => false,
        }
    }

    /// Close every cached pool. Shutdown only: in-flight requests must have drained.
    pub async fn close_all(&self) {
        let cells: Vec<(String, PoolCell<C::Pool>)> = {
            let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
            pools.drain().collect()
        };
        let mut closed = 0usize;
        for (_, cell) in cells {
            if let Some(pool) = settled(&cell).await {
                self.connector.close(pool).await;
                closed += 1;
            }
        }
        tracing::info!(closed, "tenant pools closed");
    }

    /// Number of live (successfully constructed) pools.
    pub fn len(&self) -> usize {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        pools.values().filter(|c| c.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, db_name: &str) -> bool {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        pools.get(db_name).map(|c| c.initialized()).unwrap_or(false)
    }
}
