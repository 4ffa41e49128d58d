//! Request-scoped tenant context. Stored in request extensions by type, so a handler either
//! gets a fully resolved context or the request never reaches it.

use crate::auth::{Claims, SUPER_ADMIN_ROLE};
use crate::error::AppError;
use crate::tenant::Tenant;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;

/// Authenticated caller, taken from verified token claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Principal {
    pub fn is_super_admin(&self) -> bool {
        self.role.as_deref() == Some(SUPER_ADMIN_ROLE)
    }
}

impl From<Claims> for Principal {
    fn from(c: Claims) -> Self {
        Principal {
            user_id: c.sub,
            tenant_id: c.tenant_id.filter(|t| !t.is_empty()),
            role: c.role,
        }
    }
}

/// Resolved tenant, its pool, and the caller (absent on public routes). Read-only once built.
#[derive(Clone, Debug)]
pub struct TenantContext<P = PgPool> {
    pub tenant: Arc<Tenant>,
    pub pool: P,
    pub principal: Option<Principal>,
}

#[async_trait]
impl<S, P> FromRequestParts<S> for TenantContext<P>
where
    S: Send + Sync,
    P: Clone + Send + Sync + 'static,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext<P>>()
            .cloned()
            .ok_or_else(|| AppError::Internal("tenant context missing: route is not behind a tenant resolver".into()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("authentication required".into()))
    }
}
