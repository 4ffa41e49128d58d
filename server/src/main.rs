//! Car-rental backend server.
//!
//! Run from repo root: `cargo run -p rental-saas-server`

use rental_saas::{app_routes, ensure_registry_tables, AppState, Settings};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rental_saas=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let control = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.control_max_connections)
        .acquire_timeout(settings.tenant_pool.acquire_timeout)
        .connect(&settings.database_url)
        .await?;
    ensure_registry_tables(&control).await?;

    let bind_addr = settings.bind_addr;
    let request_timeout = settings.request_timeout;
    let state = AppState::postgres(control.clone(), settings);

    // A timed-out request drops its future, which returns any checked-out connection.
    let app = app_routes(state.clone())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.pools.close_all().await;
    control.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
}
