//! Tenant-scoped routes. Operational routes trust only the token's tenant claim; public
//! routes trust only the Host header.

use crate::handlers::tenant::{me, public_tenant};
use crate::middleware::{host_scoped, token_scoped};
use crate::pool::{PgConnector, PoolConnector};
use crate::state::AppState;
use axum::{routing::get, Router};

/// Authenticated operational routes (GET /me).
pub fn tenant_routes(state: AppState<PgConnector>) -> Router {
    let router = Router::new().route("/me", get(me));
    token_scoped(router, &state).with_state(state)
}

/// Pre-authentication routes resolved by subdomain (GET /public/tenant).
pub fn public_routes<C: PoolConnector>(state: AppState<C>) -> Router {
    let router = Router::new().route("/public/tenant", get(public_tenant::<C::Pool>));
    host_scoped(router, &state).with_state(state)
}
