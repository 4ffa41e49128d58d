//! Tenant provisioning and deletion.
//!
//! Provisioning spans the control-plane registry and a separately created physical
//! database, so it runs as a saga: registry row (status `provisioning`) → create database
//! → apply schema → seed → mark `active`. A failure after the registry insert undoes the
//! completed steps in reverse. If the undo itself fails the row is left as `failed` and the
//! caller gets `ProvisioningPartialFailure` naming the step that broke.

use crate::auth::hash_password;
use crate::error::AppError;
use crate::pool::{PoolConnector, TenantPoolManager};
use crate::registry::TenantStore;
use crate::settings::RetentionPolicy;
use crate::store;
use crate::tenant::{validate_subdomain, NewTenant, SubscriptionTier, Tenant, TenantStatus};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

/// Administrative provisioning input.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct ProvisionRequest {
    pub name: String,
    pub subdomain: String,
    pub admin_email: String,
    pub admin_password: String,
    pub tier: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

/// First administrator of a new tenant. The password is already hashed.
#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub email: String,
    pub password_hash: String,
}

impl ProvisionRequest {
    /// Validate and split into the registry insert and the admin seed.
    pub fn prepare(&self) -> Result<(NewTenant, AdminSeed), AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        let subdomain = self.subdomain.trim();
        validate_subdomain(subdomain)?;
        let email = self.admin_email.trim();
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(AppError::Validation("admin_email must be an email address".into()));
        }
        if self.admin_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "admin_password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let subscription_tier: SubscriptionTier = self.tier.parse()?;
        let new = NewTenant {
            name: name.to_string(),
            subdomain: subdomain.to_string(),
            subscription_tier,
            payment_method: self.payment_method.clone().filter(|s| !s.trim().is_empty()),
            logo_url: self.logo_url.clone().filter(|s| !s.trim().is_empty()),
        };
        let seed = AdminSeed {
            email: email.to_lowercase(),
            password_hash: hash_password(&self.admin_password)?,
        };
        Ok((new, seed))
    }
}

/// Oldest user of a tenant database together with its role name.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct TenantUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

/// Physical database operations provisioning needs, separate from pool construction.
#[async_trait]
pub trait TenantDatabaseAdmin: Send + Sync {
    type Pool: Send + Sync;

    /// Create the database. Returns false (and does nothing) if it already exists.
    async fn create_database(&self, db_name: &str) -> Result<bool, AppError>;

    async fn drop_database(&self, db_name: &str) -> Result<(), AppError>;

    async fn rename_database(&self, from: &str, to: &str) -> Result<(), AppError>;

    async fn apply_schema(&self, pool: &Self::Pool) -> Result<(), AppError>;

    /// Mirrored tenant row, `admin` role and the admin user.
    async fn seed(&self, pool: &Self::Pool, tenant: &Tenant, admin: &AdminSeed) -> Result<(), AppError>;

    /// First user (by creation time) that has a role. `NotFound` when there is none.
    async fn first_user(&self, pool: &Self::Pool) -> Result<TenantUser, AppError>;
}

/// [`TenantDatabaseAdmin`] issuing DDL through the control-plane pool.
#[derive(Clone)]
pub struct PgDatabaseAdmin {
    control: PgPool,
}

impl PgDatabaseAdmin {
    pub fn new(control: PgPool) -> Self {
        Self { control }
    }
}

#[async_trait]
impl TenantDatabaseAdmin for PgDatabaseAdmin {
    type Pool = PgPool;

    async fn create_database(&self, db_name: &str) -> Result<bool, AppError> {
        let mut conn = self.control.acquire().await?;
        store::create_database(&mut *conn, db_name).await
    }

    async fn drop_database(&self, db_name: &str) -> Result<(), AppError> {
        let mut conn = self.control.acquire().await?;
        store::drop_database(&mut *conn, db_name).await
    }

    async fn rename_database(&self, from: &str, to: &str) -> Result<(), AppError> {
        let mut conn = self.control.acquire().await?;
        store::rename_database(&mut *conn, from, to).await
    }

    async fn apply_schema(&self, pool: &PgPool) -> Result<(), AppError> {
        store::apply_tenant_schema(pool).await
    }

    async fn seed(&self, pool: &PgPool, tenant: &Tenant, admin: &AdminSeed) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO tenants (id, name, subdomain, db_name, subscription_tier, logo_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.subdomain)
        .bind(&tenant.db_name)
        .bind(tenant.subscription_tier.as_str())
        .bind(&tenant.logo_url)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO roles (id, name, description) VALUES ($1, 'admin', 'Administrator') ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .execute(&mut *tx)
        .await?;
        let (role_id,): (Uuid,) = sqlx::query_as("SELECT id FROM roles WHERE name = 'admin'")
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_id, email, password_hash, first_name, last_name, role_id)
            VALUES ($1, $2, $3, $4, 'Admin', 'User', $5)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant.id)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(role_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn first_user(&self, pool: &PgPool) -> Result<TenantUser, AppError> {
        sqlx::query_as::<_, TenantUser>(
            r#"
            SELECT u.id, u.email, r.name AS role
            FROM users u
            JOIN roles r ON u.role_id = r.id
            ORDER BY u.created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("no users found for tenant".into()))
    }
}

/// Failure of one forward step.
struct StepFailure {
    step: &'static str,
    error: AppError,
}

fn at(step: &'static str) -> impl FnOnce(AppError) -> StepFailure {
    move |error| StepFailure { step, error }
}

/// Runs the provisioning saga and tenant deletion. Each run is spawned onto its own task
/// and finishes, compensation included, even if the caller stops waiting.
pub struct Provisioner<C: PoolConnector> {
    registry: Arc<dyn TenantStore>,
    pools: Arc<TenantPoolManager<C>>,
    admin: Arc<dyn TenantDatabaseAdmin<Pool = C::Pool>>,
    retention: RetentionPolicy,
}

impl<C: PoolConnector> Clone for Provisioner<C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            pools: self.pools.clone(),
            admin: self.admin.clone(),
            retention: self.retention,
        }
    }
}

impl<C: PoolConnector> Provisioner<C> {
    pub fn new(
        registry: Arc<dyn TenantStore>,
        pools: Arc<TenantPoolManager<C>>,
        admin: Arc<dyn TenantDatabaseAdmin<Pool = C::Pool>>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            registry,
            pools,
            admin,
            retention,
        }
    }

    /// Stand up a tenant. A taken subdomain is rejected by the registry insert, before any
    /// physical database is touched.
    pub async fn provision(&self, req: &ProvisionRequest) -> Result<Tenant, AppError> {
        let (new, seed) = req.prepare()?;
        let saga = self.clone();
        tokio::spawn(async move { saga.run(new, seed).await })
            .await
            .map_err(|e| AppError::Internal(format!("provisioning task failed: {}", e)))?
    }

    async fn run(&self, new: NewTenant, seed: AdminSeed) -> Result<Tenant, AppError> {
        let mut tenant = self.registry.create(&new).await?;
        tracing::info!(tenant_id = %tenant.id, subdomain = %tenant.subdomain, db = %tenant.db_name, "tenant registered");

        let mut created_database = false;
        match self.run_steps(&tenant, &seed, &mut created_database).await {
            Ok(()) => {
                tenant.status = TenantStatus::Active;
                tracing::info!(tenant_id = %tenant.id, "tenant provisioned");
                Ok(tenant)
            }
            Err(failure) => Err(self.compensate(&tenant, created_database, failure).await),
        }
    }

    async fn run_steps(&self, tenant: &Tenant, seed: &AdminSeed, created_database: &mut bool) -> Result<(), StepFailure> {
        let created = self
            .admin
            .create_database(&tenant.db_name)
            .await
            .map_err(at("create_database"))?;
        if !created {
            // A database left by an earlier tenant with this subdomain (retained on delete)
            // must never be handed to a new tenant.
            return Err(StepFailure {
                step: "create_database",
                error: AppError::Conflict(format!("database identifier already in use: {}", tenant.subdomain)),
            });
        }
        *created_database = true;
        tracing::info!(db = %tenant.db_name, "tenant database created");

        let pool = self.pools.get_pool(&tenant.db_name).await.map_err(at("connect"))?;
        self.admin.apply_schema(&pool).await.map_err(at("apply_schema"))?;
        self.admin.seed(&pool, tenant, seed).await.map_err(at("seed"))?;
        self.registry
            .set_status(tenant.id, TenantStatus::Active)
            .await
            .map_err(at("activate"))?;
        Ok(())
    }

    /// Undo completed steps in reverse. Returns the error to report.
    async fn compensate(&self, tenant: &Tenant, created_database: bool, failure: StepFailure) -> AppError {
        let StepFailure { step, error } = failure;
        tracing::warn!(tenant_id = %tenant.id, step, error = %error, "provisioning failed, compensating");

        self.pools.evict(&tenant.db_name).await;
        let mut cleanup = Ok(());
        if created_database {
            cleanup = self.admin.drop_database(&tenant.db_name).await;
        }
        if cleanup.is_ok() {
            cleanup = self.registry.delete(tenant.id).await.map(|_| ());
        }

        match cleanup {
            Ok(()) => {
                tracing::info!(tenant_id = %tenant.id, "provisioning rolled back");
                error
            }
            Err(cleanup_error) => {
                tracing::error!(tenant_id = %tenant.id, error = %cleanup_error, "compensation failed, tenant left as failed");
                if let Err(e) = self.registry.set_status(tenant.id, TenantStatus::Failed).await {
                    tracing::error!(tenant_id = %tenant.id, error = %e, "could not mark tenant failed");
                }
                AppError::ProvisioningPartialFailure {
                    tenant_id: tenant.id.to_string(),
                    step,
                    message: error.to_string(),
                }
            }
        }
    }

    /// Delete a tenant. The row is marked `deleting` (no longer resolvable), the cached
    /// pool is closed, the retention policy is applied to the physical database and only
    /// then is the row removed. A failed retention step leaves the row in place so the
    /// delete can be retried.
    pub async fn delete(&self, id: Uuid) -> Result<Tenant, AppError> {
        let saga = self.clone();
        tokio::spawn(async move { saga.run_delete(id).await })
            .await
            .map_err(|e| AppError::Internal(format!("deletion task failed: {}", e)))?
    }

    async fn run_delete(&self, id: Uuid) -> Result<Tenant, AppError> {
        let tenant = self.registry.lookup_by_id(id).await?;
        if tenant.status != TenantStatus::Deleting {
            self.registry.set_status(id, TenantStatus::Deleting).await?;
        }
        self.pools.evict(&tenant.db_name).await;

        match self.retention {
            RetentionPolicy::Retain => {
                tracing::info!(tenant_id = %id, db = %tenant.db_name, "database retained");
            }
            RetentionPolicy::Drop => {
                self.admin.drop_database(&tenant.db_name).await.map_err(|e| {
                    tracing::error!(tenant_id = %id, db = %tenant.db_name, error = %e, "drop failed, tenant left as deleting");
                    e
                })?;
                tracing::info!(tenant_id = %id, db = %tenant.db_name, "database dropped");
            }
            RetentionPolicy::Archive => {
                let archived = archive_name(&tenant.db_name, Utc::now().timestamp());
                self.admin.rename_database(&tenant.db_name, &archived).await.map_err(|e| {
                    tracing::error!(tenant_id = %id, db = %tenant.db_name, error = %e, "archive failed, tenant left as deleting");
                    e
                })?;
                tracing::info!(tenant_id = %id, db = %archived, "database archived");
            }
        }

        let tenant = self.registry.delete(id).await?;
        tracing::info!(tenant_id = %id, "tenant deleted");
        Ok(tenant)
    }
}

pub fn archive_name(db_name: &str, unix_secs: i64) -> String {
    format!("{}_archived_{}", db_name, unix_secs)
}
