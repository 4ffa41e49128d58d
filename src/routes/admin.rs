//! Platform administration routes, super-admin only.

use crate::handlers::admin::{
    create_tenant, delete_tenant, get_tenant, impersonate_tenant, list_tenants, stats, update_subscription,
};
use crate::middleware::admin_scoped;
use crate::pool::PoolConnector;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};

pub fn admin_routes<C: PoolConnector>(state: AppState<C>) -> Router {
    let router = Router::new()
        .route("/tenants", get(list_tenants::<C>).post(create_tenant::<C>))
        .route("/tenants/:id", get(get_tenant::<C>).delete(delete_tenant::<C>))
        .route("/tenants/:id/subscription", patch(update_subscription::<C>))
        .route("/tenants/:id/impersonate", post(impersonate_tenant::<C>))
        .route("/stats", get(stats::<C>));
    admin_scoped(router, &state).with_state(state)
}
