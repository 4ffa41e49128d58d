//! Multi-tenant car-rental backend core: tenant registry, per-tenant database routing,
//! request-scoped tenant context and tenant provisioning.

pub mod auth;
pub mod context;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod pool;
pub mod provision;
pub mod registry;
pub mod resolver;
pub mod response;
pub mod routes;
pub mod settings;
pub mod state;
pub mod store;
pub mod tenant;

pub use auth::{issue_token, verify_token, Claims};
pub use context::{Principal, TenantContext};
pub use error::{AppError, ConfigError};
pub use openapi::ApiDoc;
pub use pool::{PgConnector, PoolConnector, TenantPoolManager};
pub use provision::{
    AdminSeed, PgDatabaseAdmin, ProvisionRequest, Provisioner, TenantDatabaseAdmin, TenantUser,
};
pub use registry::{PgTenantRegistry, TenantStats, TenantStore};
pub use resolver::{parse_subdomain, TenantResolver};
pub use routes::{admin_routes, app_routes, common_routes, public_routes, tenant_routes};
pub use settings::{RetentionPolicy, Settings};
pub use state::AppState;
pub use store::ensure_registry_tables;
pub use tenant::{NewTenant, SubscriptionTier, Tenant, TenantStatus};
