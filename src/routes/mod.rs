//! Route tables.

pub mod admin;
pub mod common;
pub mod tenant;

pub use admin::admin_routes;
pub use common::common_routes;
pub use tenant::{public_routes, tenant_routes};

use crate::state::AppState;
use axum::Router;

/// Full production router: common routes at the root, everything else under `/api/v1`.
pub fn app_routes(state: AppState) -> Router {
    let api = Router::new()
        .nest("/admin", admin_routes(state.clone()))
        .merge(tenant_routes(state.clone()))
        .merge(public_routes(state.clone()));
    Router::new()
        .merge(common_routes(state))
        .nest("/api/v1", api)
}
