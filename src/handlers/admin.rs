//! Platform administration of tenants. Super-admin only.

use super::parse_tenant_id;
use crate::auth::{issue_token, Claims};
use crate::error::AppError;
use crate::pool::PoolConnector;
use crate::provision::ProvisionRequest;
use crate::response::{created, ok, ok_many};
use crate::state::AppState;
use crate::tenant::SubscriptionTier;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const IMPERSONATION_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequest {
    pub tier: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImpersonatedUser {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImpersonationResponse {
    pub token: String,
    pub user: ImpersonatedUser,
}

/// POST /api/v1/admin/tenants
pub async fn create_tenant<C: PoolConnector>(
    State(state): State<AppState<C>>,
    Json(req): Json<ProvisionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tenant = state.provisioner().provision(&req).await?;
    Ok(created(tenant))
}

/// GET /api/v1/admin/tenants
pub async fn list_tenants<C: PoolConnector>(
    State(state): State<AppState<C>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok_many(state.registry.list().await?))
}

/// GET /api/v1/admin/tenants/:id
pub async fn get_tenant<C: PoolConnector>(
    State(state): State<AppState<C>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_tenant_id(&id_str)?;
    Ok(ok(state.registry.lookup_by_id(id).await?))
}

/// DELETE /api/v1/admin/tenants/:id. What happens to the database depends on the
/// configured retention policy.
pub async fn delete_tenant<C: PoolConnector>(
    State(state): State<AppState<C>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_tenant_id(&id_str)?;
    state.provisioner().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/admin/tenants/:id/subscription
pub async fn update_subscription<C: PoolConnector>(
    State(state): State<AppState<C>>,
    Path(id_str): Path<String>,
    Json(req): Json<UpdateSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_tenant_id(&id_str)?;
    let tier: SubscriptionTier = req.tier.parse()?;
    let tenant = state.registry.update_tier(id, tier).await?;
    tracing::info!(tenant_id = %id, %tier, "subscription updated");
    Ok(ok(tenant))
}

/// GET /api/v1/admin/stats
pub async fn stats<C: PoolConnector>(
    State(state): State<AppState<C>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.registry.stats().await?))
}

/// POST /api/v1/admin/tenants/:id/impersonate: a one-hour token for the tenant's oldest user,
/// scoped to that tenant.
pub async fn impersonate_tenant<C: PoolConnector>(
    State(state): State<AppState<C>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_tenant_id(&id_str)?;
    let ctx = state.resolver().resolve_by_id(id).await?;
    let user = state.admin.first_user(&ctx.pool).await?;
    let claims = Claims::new(
        user.id.to_string(),
        Some(ctx.tenant.id.to_string()),
        Some(user.role.clone()),
        IMPERSONATION_TTL_SECS,
    );
    let token = issue_token(&claims, &state.settings.jwt_secret)?;
    tracing::info!(tenant_id = %id, user_id = %user.id, "impersonation token issued");
    Ok(ok(ImpersonationResponse {
        token,
        user: ImpersonatedUser {
            email: user.email,
            role: user.role,
        },
    }))
}
