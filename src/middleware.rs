//! Request pipeline steps: authenticate → resolve tenant → handler.
//! A failing step returns its error response and nothing downstream runs.

use crate::auth::{bearer_token, verify_token};
use crate::context::Principal;
use crate::error::AppError;
use crate::pool::PoolConnector;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header::{AUTHORIZATION, HOST},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    Router,
};

/// Verify the bearer token and attach the [`Principal`].
pub async fn authenticate<C: PoolConnector>(
    State(state): State<AppState<C>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("authorization header required".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("invalid authorization header".into()))?;
    let token = bearer_token(header).ok_or_else(|| AppError::Unauthorized("bearer token required".into()))?;
    let claims = verify_token(token, &state.settings.jwt_secret)?;
    req.extensions_mut().insert(Principal::from(claims));
    Ok(next.run(req).await)
}

pub async fn require_super_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| AppError::Unauthorized("authentication required".into()))?;
    if !principal.is_super_admin() {
        return Err(AppError::Forbidden("super admin access required".into()));
    }
    Ok(next.run(req).await)
}

/// Resolve the tenant from the token's tenant claim. Must run after [`authenticate`].
pub async fn resolve_tenant_from_token<C: PoolConnector>(
    State(state): State<AppState<C>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("authentication required".into()))?;
    let ctx = state.resolver().resolve_by_principal(&principal).await?;
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Resolve the tenant from the Host header. Public routes only.
pub async fn resolve_tenant_from_host<C: PoolConnector>(
    State(state): State<AppState<C>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ctx = state.resolver().resolve_by_host(host.as_deref()).await?;
    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Put every route of `router` behind authenticate → token tenant resolution.
pub fn token_scoped<C: PoolConnector>(router: Router<AppState<C>>, state: &AppState<C>) -> Router<AppState<C>> {
    // Layers run outermost-last-added: authenticate wraps resolution.
    router
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant_from_token::<C>))
        .route_layer(from_fn_with_state(state.clone(), authenticate::<C>))
}

/// Put every route of `router` behind Host-based tenant resolution.
pub fn host_scoped<C: PoolConnector>(router: Router<AppState<C>>, state: &AppState<C>) -> Router<AppState<C>> {
    router.route_layer(from_fn_with_state(state.clone(), resolve_tenant_from_host::<C>))
}

/// Put every route of `router` behind authenticate → super-admin check.
pub fn admin_scoped<C: PoolConnector>(router: Router<AppState<C>>, state: &AppState<C>) -> Router<AppState<C>> {
    router
        .route_layer(from_fn(require_super_admin))
        .route_layer(from_fn_with_state(state.clone(), authenticate::<C>))
}
