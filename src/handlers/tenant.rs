//! Tenant-scoped endpoints. The context extractor guarantees the tenant was resolved
//! before any of these run.

use crate::context::{Principal, TenantContext};
use crate::error::AppError;
use crate::response::ok;
use crate::tenant::{SubscriptionTier, Tenant};
use axum::response::IntoResponse;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

/// What a tenant exposes to anonymous visitors.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicTenant {
    pub name: String,
    pub subdomain: String,
    pub subscription_tier: SubscriptionTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl From<&Tenant> for PublicTenant {
    fn from(t: &Tenant) -> Self {
        PublicTenant {
            name: t.name.clone(),
            subdomain: t.subdomain.clone(),
            subscription_tier: t.subscription_tier,
            logo_url: t.logo_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    role: Option<String>,
}

#[derive(Serialize)]
struct MeBody {
    principal: Principal,
    user: UserRow,
    tenant: PublicTenant,
}

/// GET /api/v1/public/tenant
pub async fn public_tenant<P>(ctx: TenantContext<P>) -> impl IntoResponse
where
    P: Clone + Send + Sync + 'static,
{
    ok(PublicTenant::from(ctx.tenant.as_ref()))
}

/// GET /api/v1/me: the caller's user row, read from the caller's own tenant database.
pub async fn me(ctx: TenantContext<PgPool>) -> Result<impl IntoResponse, AppError> {
    let principal = ctx
        .principal
        .clone()
        .ok_or_else(|| AppError::Unauthorized("authentication required".into()))?;
    let user_id = Uuid::parse_str(&principal.user_id)
        .map_err(|_| AppError::Unauthorized("invalid token subject".into()))?;
    let user: UserRow = sqlx::query_as(
        r#"
        SELECT u.id, u.email, u.first_name, u.last_name, r.name AS role
        FROM users u
        LEFT JOIN roles r ON r.id = u.role_id
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&ctx.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    Ok(ok(MeBody {
        principal,
        user,
        tenant: PublicTenant::from(ctx.tenant.as_ref()),
    }))
}
