//! Tenant resolution: map a request's tenant signal to a registry entry and its pool.
//!
//! Public routes only have the Host header. Authenticated routes use the tenant claim
//! from the verified token and never look at Host, which a logged-in user controls.

use crate::context::{Principal, TenantContext};
use crate::error::AppError;
use crate::pool::{PoolConnector, TenantPoolManager};
use crate::registry::{tenant_not_found, TenantStore};
use crate::tenant::Tenant;
use std::sync::Arc;
use uuid::Uuid;

/// Subdomain named by a Host header value. Strips the port and lower-cases.
/// `acme.localhost` → `acme`; `acme.example.com` → `acme`; two-label hosts, bare names and
/// `www` fall back to `default`.
pub fn parse_subdomain(host: &str, default: &str) -> String {
    let host = host.trim().split(':').next().unwrap_or("").to_ascii_lowercase();
    let parts: Vec<&str> = host.split('.').collect();
    let candidate = match parts.as_slice() {
        [first, .., "localhost"] => *first,
        [first, _, _, ..] => *first,
        _ => "",
    };
    if candidate.is_empty() || candidate == "www" {
        default.to_string()
    } else {
        candidate.to_string()
    }
}

pub struct TenantResolver<'a, C: PoolConnector> {
    registry: &'a dyn TenantStore,
    pools: &'a TenantPoolManager<C>,
    default_subdomain: &'a str,
}

impl<'a, C: PoolConnector> TenantResolver<'a, C> {
    pub fn new(
        registry: &'a dyn TenantStore,
        pools: &'a TenantPoolManager<C>,
        default_subdomain: &'a str,
    ) -> Self {
        Self {
            registry,
            pools,
            default_subdomain,
        }
    }

    /// Subdomain strategy for pre-authentication routes.
    pub async fn resolve_by_host(&self, host: Option<&str>) -> Result<TenantContext<C::Pool>, AppError> {
        let subdomain = parse_subdomain(host.unwrap_or(""), self.default_subdomain);
        tracing::debug!(%subdomain, "resolving tenant by host");
        let tenant = self.registry.lookup_by_subdomain(&subdomain).await?;
        self.attach(tenant, None).await
    }

    /// Token-claim strategy for authenticated routes.
    pub async fn resolve_by_principal(&self, principal: &Principal) -> Result<TenantContext<C::Pool>, AppError> {
        let claim = principal
            .tenant_id
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("token carries no tenant".into()))?;
        // A well-signed claim that is not a tenant id cannot name a registered tenant.
        let id = Uuid::parse_str(claim).map_err(|_| tenant_not_found(claim))?;
        tracing::debug!(tenant_id = %id, user_id = %principal.user_id, "resolving tenant by token");
        let tenant = self.registry.lookup_by_id(id).await?;
        self.attach(tenant, Some(principal.clone())).await
    }

    /// Registry id strategy, for platform operations acting on a known tenant.
    pub async fn resolve_by_id(&self, id: Uuid) -> Result<TenantContext<C::Pool>, AppError> {
        let tenant = self.registry.lookup_by_id(id).await?;
        self.attach(tenant, None).await
    }

    async fn attach(&self, tenant: Tenant, principal: Option<Principal>) -> Result<TenantContext<C::Pool>, AppError> {
        if !tenant.is_active() {
            tracing::debug!(tenant_id = %tenant.id, status = %tenant.status, "tenant not active");
            return Err(tenant_not_found(&tenant.subdomain));
        }
        let pool = self.pools.get_pool(&tenant.db_name).await?;
        Ok(TenantContext {
            tenant: Arc::new(tenant),
            pool,
            principal,
        })
    }
}
