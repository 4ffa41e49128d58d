//! Common routes: health, readiness, version, OpenAPI document.

use crate::openapi::ApiDoc;
use crate::pool::PoolConnector;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use utoipa::OpenApi;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    registry: &'static str,
    tenant_pools: usize,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ready<C: PoolConnector>(
    State(state): State<AppState<C>>,
) -> Result<Json<ReadyBody>, (StatusCode, Json<ReadyBody>)> {
    let tenant_pools = state.pools.len();
    if let Err(e) = state.registry.ping().await {
        tracing::warn!(error = %e, "readiness check failed");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyBody {
                status: "degraded",
                registry: "unavailable",
                tenant_pools,
            }),
        ));
    }
    Ok(Json(ReadyBody {
        status: "ok",
        registry: "ok",
        tenant_pools,
    }))
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// GET /health, GET /ready (registry reachability), GET /version, GET /api-doc/openapi.json.
pub fn common_routes<C: PoolConnector>(state: AppState<C>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready::<C>))
        .route("/version", get(version))
        .route("/api-doc/openapi.json", get(openapi_json))
        .with_state(state)
}
