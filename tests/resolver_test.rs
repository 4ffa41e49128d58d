//! Integration tests for tenant resolution: subdomain strategy, token-claim strategy and
//! per-tenant pool isolation.

mod common;

use common::{setup, tenant};
use rental_saas::{AppError, Principal, TenantStatus};
use std::sync::Arc;

fn principal(tenant_id: Option<String>) -> Principal {
    Principal {
        user_id: "7d6f7d38-0c0e-4a5f-9a3b-0f4c1c1f2a11".into(),
        tenant_id,
        role: Some("admin".into()),
    }
}

#[tokio::test]
async fn resolves_active_tenant_by_subdomain() {
    let h = setup();
    let acme = tenant("acme", TenantStatus::Active);
    h.registry.insert(acme.clone());

    let ctx = h.state.resolver().resolve_by_host(Some("acme.localhost:5173")).await.unwrap();

    assert_eq!(ctx.tenant.id, acme.id);
    assert_eq!(ctx.pool.db_name, "tenant_acme");
    assert!(ctx.principal.is_none());
}

#[tokio::test]
async fn bare_host_falls_back_to_default_tenant() {
    let h = setup();
    h.registry.insert(tenant("default", TenantStatus::Active));

    let ctx = h.state.resolver().resolve_by_host(Some("example.com")).await.unwrap();
    assert_eq!(ctx.tenant.subdomain, "default");

    let ctx = h.state.resolver().resolve_by_host(None).await.unwrap();
    assert_eq!(ctx.tenant.subdomain, "default");
}

#[tokio::test]
async fn unknown_subdomain_is_not_found_and_builds_no_pool() {
    let h = setup();

    let err = h.state.resolver().resolve_by_host(Some("ghost.example.com")).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.connector.connects(), 0);
}

#[tokio::test]
async fn inactive_tenants_do_not_resolve() {
    let h = setup();
    h.registry.insert(tenant("pending", TenantStatus::Provisioning));
    h.registry.insert(tenant("broken", TenantStatus::Failed));

    for host in ["pending.localhost", "broken.localhost"] {
        let err = h.state.resolver().resolve_by_host(Some(host)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{host}: {err}");
    }
    assert_eq!(h.connector.connects(), 0);
}

#[tokio::test]
async fn resolves_by_token_claim() {
    let h = setup();
    let acme = tenant("acme", TenantStatus::Active);
    h.registry.insert(acme.clone());

    let who = principal(Some(acme.id.to_string()));
    let ctx = h.state.resolver().resolve_by_principal(&who).await.unwrap();

    assert_eq!(ctx.tenant.subdomain, "acme");
    assert_eq!(ctx.pool.db_name, "tenant_acme");
    assert_eq!(ctx.principal, Some(who));
}

#[tokio::test]
async fn token_without_tenant_claim_is_unauthorized() {
    let h = setup();
    let err = h.state.resolver().resolve_by_principal(&principal(None)).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn unknown_or_malformed_tenant_claim_is_not_found() {
    let h = setup();

    let err = h
        .state
        .resolver()
        .resolve_by_principal(&principal(Some("not-a-uuid".into())))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = h
        .state
        .resolver()
        .resolve_by_principal(&principal(Some(uuid::Uuid::new_v4().to_string())))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn tenants_are_routed_to_their_own_pools() {
    let h = setup();
    let acme = tenant("acme", TenantStatus::Active);
    let globex = tenant("globex", TenantStatus::Active);
    h.registry.insert(acme.clone());
    h.registry.insert(globex.clone());

    let resolver = h.state.resolver();
    let a1 = resolver.resolve_by_host(Some("acme.example.com")).await.unwrap();
    let g = resolver.resolve_by_principal(&principal(Some(globex.id.to_string()))).await.unwrap();
    let a2 = resolver.resolve_by_principal(&principal(Some(acme.id.to_string()))).await.unwrap();

    assert_eq!(g.pool.db_name, "tenant_globex");
    assert!(!Arc::ptr_eq(&a1.pool, &g.pool));
    // Both strategies share the cache: the same tenant gets the same pool.
    assert!(Arc::ptr_eq(&a1.pool, &a2.pool));
    assert_eq!(h.connector.connects(), 2);
}

#[tokio::test]
async fn unreachable_database_is_pool_unavailable_then_recovers() {
    let h = setup();
    h.registry.insert(tenant("acme", TenantStatus::Active));
    h.connector.set_failing(true);

    let err = h.state.resolver().resolve_by_host(Some("acme.localhost")).await.unwrap_err();
    assert!(matches!(err, AppError::PoolUnavailable(_)));

    h.connector.set_failing(false);
    let ctx = h.state.resolver().resolve_by_host(Some("acme.localhost")).await.unwrap();
    assert_eq!(ctx.pool.db_name, "tenant_acme");
}
