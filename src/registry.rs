//! Tenant registry: catalog of tenants in the shared control-plane database.
//!
//! Every lookup is a live query. Tenant metadata changes rarely, so the cost of one
//! registry round trip per request is accepted in exchange for never serving a stale
//! tenant-to-database mapping.

use crate::error::{conflict_on_unique, AppError};
use crate::tenant::{NewTenant, SubscriptionTier, Tenant, TenantStatus, PLATFORM_SUBDOMAIN};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

/// Aggregate counts for the platform dashboard. The platform tenant is excluded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct TenantStats {
    pub total_tenants: i64,
    pub active_tenants: i64,
    pub new_this_month: i64,
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Exact match. Host parsing has already normalised the label.
    async fn lookup_by_subdomain(&self, subdomain: &str) -> Result<Tenant, AppError>;

    async fn lookup_by_id(&self, id: Uuid) -> Result<Tenant, AppError>;

    /// Insert with status `provisioning`. `Conflict` when the subdomain (or its derived
    /// database identifier) is taken.
    async fn create(&self, new: &NewTenant) -> Result<Tenant, AppError>;

    async fn update_tier(&self, id: Uuid, tier: SubscriptionTier) -> Result<Tenant, AppError>;

    async fn set_status(&self, id: Uuid, status: TenantStatus) -> Result<(), AppError>;

    /// Remove the registry row and return what was removed.
    async fn delete(&self, id: Uuid) -> Result<Tenant, AppError>;

    /// All tenants except the platform tenant, newest first.
    async fn list(&self) -> Result<Vec<Tenant>, AppError>;

    async fn stats(&self) -> Result<TenantStats, AppError>;

    /// Cheap reachability check for the readiness endpoint.
    async fn ping(&self) -> Result<(), AppError>;
}

pub(crate) fn tenant_not_found(what: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("tenant not found: {}", what))
}

#[derive(sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    subdomain: String,
    db_name: String,
    subscription_tier: String,
    status: String,
    payment_method: Option<String>,
    logo_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = AppError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        Ok(Tenant {
            id: row.id,
            name: row.name,
            subdomain: row.subdomain,
            db_name: row.db_name,
            subscription_tier: row.subscription_tier.parse()?,
            status: row.status.parse()?,
            payment_method: row.payment_method,
            logo_url: row.logo_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TENANT_COLUMNS: &str = "id, name, subdomain, db_name, subscription_tier, status, payment_method, logo_url, created_at, updated_at";

/// [`TenantStore`] backed by the control-plane `tenants` table.
#[derive(Clone)]
pub struct PgTenantRegistry {
    pool: PgPool,
}

impl PgTenantRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TenantStore for PgTenantRegistry {
    async fn lookup_by_subdomain(&self, subdomain: &str) -> Result<Tenant, AppError> {
        let sql = format!("SELECT {} FROM tenants WHERE subdomain = $1", TENANT_COLUMNS);
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(subdomain)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| tenant_not_found(subdomain))?.try_into()
    }

    async fn lookup_by_id(&self, id: Uuid) -> Result<Tenant, AppError> {
        let sql = format!("SELECT {} FROM tenants WHERE id = $1", TENANT_COLUMNS);
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| tenant_not_found(id))?.try_into()
    }

    async fn create(&self, new: &NewTenant) -> Result<Tenant, AppError> {
        let sql = format!(
            r#"
            INSERT INTO tenants (id, name, subdomain, db_name, subscription_tier, payment_method, logo_url, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            TENANT_COLUMNS
        );
        let row: TenantRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(&new.subdomain)
            .bind(new.db_name())
            .bind(new.subscription_tier.as_str())
            .bind(&new.payment_method)
            .bind(&new.logo_url)
            .bind(TenantStatus::Provisioning.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, format!("subdomain already registered: {}", new.subdomain)))?;
        row.try_into()
    }

    async fn update_tier(&self, id: Uuid, tier: SubscriptionTier) -> Result<Tenant, AppError> {
        let sql = format!(
            "UPDATE tenants SET subscription_tier = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            TENANT_COLUMNS
        );
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(tier.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| tenant_not_found(id))?.try_into()
    }

    async fn set_status(&self, id: Uuid, status: TenantStatus) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE tenants SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(tenant_not_found(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Tenant, AppError> {
        let sql = format!("DELETE FROM tenants WHERE id = $1 RETURNING {}", TENANT_COLUMNS);
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| tenant_not_found(id))?.try_into()
    }

    async fn list(&self) -> Result<Vec<Tenant>, AppError> {
        let sql = format!(
            "SELECT {} FROM tenants WHERE subdomain <> $1 ORDER BY created_at DESC",
            TENANT_COLUMNS
        );
        let rows: Vec<TenantRow> = sqlx::query_as(&sql)
            .bind(PLATFORM_SUBDOMAIN)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Tenant::try_from).collect()
    }

    async fn stats(&self) -> Result<TenantStats, AppError> {
        let (total_tenants, active_tenants, new_this_month): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'active'),
                COUNT(*) FILTER (WHERE created_at >= date_trunc('month', CURRENT_DATE))
            FROM tenants
            WHERE subdomain <> $1
            "#,
        )
        .bind(PLATFORM_SUBDOMAIN)
        .fetch_one(&self.pool)
        .await?;
        Ok(TenantStats {
            total_tenants,
            active_tenants,
            new_this_month,
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
