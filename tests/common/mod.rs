//! In-memory registry, counting pool connector and recording database admin shared by the
//! integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rental_saas::auth::{issue_token, Claims};
use rental_saas::{
    AdminSeed, AppError, AppState, NewTenant, PoolConnector, ProvisionRequest, RetentionPolicy, Settings,
    SubscriptionTier, Tenant, TenantDatabaseAdmin, TenantStats, TenantStatus, TenantStore, TenantUser,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret";

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryRegistry {
    tenants: Mutex<HashMap<Uuid, Tenant>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl InMemoryRegistry {
    pub fn insert(&self, tenant: Tenant) {
        self.tenants.lock().unwrap().insert(tenant.id, tenant);
    }

    pub fn get(&self, id: Uuid) -> Option<Tenant> {
        self.tenants.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.tenants.lock().unwrap().len()
    }

    /// Make one operation (`create`, `set_status`, `delete`, `ping`) fail from now on.
    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    fn check(&self, op: &'static str) -> Result<(), AppError> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(AppError::Internal(format!("registry {} failed", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl TenantStore for InMemoryRegistry {
    async fn lookup_by_subdomain(&self, subdomain: &str) -> Result<Tenant, AppError> {
        self.tenants
            .lock()
            .unwrap()
            .values()
            .find(|t| t.subdomain == subdomain)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("tenant not found: {}", subdomain)))
    }

    async fn lookup_by_id(&self, id: Uuid) -> Result<Tenant, AppError> {
        self.get(id)
            .ok_or_else(|| AppError::NotFound(format!("tenant not found: {}", id)))
    }

    async fn create(&self, new: &NewTenant) -> Result<Tenant, AppError> {
        self.check("create")?;
        let mut tenants = self.tenants.lock().unwrap();
        if tenants.values().any(|t| t.subdomain == new.subdomain) {
            return Err(AppError::Conflict(format!("subdomain already taken: {}", new.subdomain)));
        }
        let now = Utc::now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            subdomain: new.subdomain.clone(),
            db_name: new.db_name(),
            subscription_tier: new.subscription_tier,
            status: TenantStatus::Provisioning,
            payment_method: new.payment_method.clone(),
            logo_url: new.logo_url.clone(),
            created_at: now,
            updated_at: now,
        };
        tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn update_tier(&self, id: Uuid, tier: SubscriptionTier) -> Result<Tenant, AppError> {
        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("tenant not found: {}", id)))?;
        tenant.subscription_tier = tier;
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }

    async fn set_status(&self, id: Uuid, status: TenantStatus) -> Result<(), AppError> {
        self.check("set_status")?;
        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("tenant not found: {}", id)))?;
        tenant.status = status;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Tenant, AppError> {
        self.check("delete")?;
        self.tenants
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("tenant not found: {}", id)))
    }

    async fn list(&self) -> Result<Vec<Tenant>, AppError> {
        let mut all: Vec<Tenant> = self.tenants.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.subdomain.cmp(&b.subdomain));
        Ok(all)
    }

    async fn stats(&self) -> Result<TenantStats, AppError> {
        let tenants = self.tenants.lock().unwrap();
        Ok(TenantStats {
            total_tenants: tenants.len() as i64,
            active_tenants: tenants.values().filter(|t| t.is_active()).count() as i64,
            new_this_month: tenants.len() as i64,
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check("ping")
    }
}

// ---------------------------------------------------------------------------
// Pool connector
// ---------------------------------------------------------------------------

/// Stand-in for a physical pool. Identity (`Arc::ptr_eq`) tells pools apart.
#[derive(Debug)]
pub struct FakePool {
    pub db_name: String,
}

/// Counts constructions and closes. Clones share counters.
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
}

impl FakeConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PoolConnector for FakeConnector {
    type Pool = Arc<FakePool>;

    async fn connect(&self, db_name: &str) -> Result<Arc<FakePool>, AppError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        // Keep construction slow enough for concurrent callers to pile up on it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::PoolUnavailable(format!("{}: connection refused", db_name)));
        }
        Ok(Arc::new(FakePool {
            db_name: db_name.to_string(),
        }))
    }

    async fn close(&self, _pool: Arc<FakePool>) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Database admin
// ---------------------------------------------------------------------------

/// Records physical database operations instead of running them.
#[derive(Default)]
pub struct FakeAdmin {
    pub databases: Mutex<HashSet<String>>,
    pub dropped: Mutex<Vec<String>>,
    pub renamed: Mutex<Vec<(String, String)>>,
    pub schemas: Mutex<Vec<String>>,
    pub seeded: Mutex<Vec<(String, String)>>,
    /// Seeded admin user per database.
    pub users: Mutex<HashMap<String, TenantUser>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl FakeAdmin {
    /// Make one operation (`create_database`, `drop_database`, `rename_database`,
    /// `apply_schema`, `seed`) fail from now on.
    pub fn fail_on(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    pub fn has_database(&self, db_name: &str) -> bool {
        self.databases.lock().unwrap().contains(db_name)
    }

    fn check(&self, op: &'static str) -> Result<(), AppError> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(AppError::Internal(format!("{} failed", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl TenantDatabaseAdmin for FakeAdmin {
    type Pool = Arc<FakePool>;

    async fn create_database(&self, db_name: &str) -> Result<bool, AppError> {
        self.check("create_database")?;
        Ok(self.databases.lock().unwrap().insert(db_name.to_string()))
    }

    async fn drop_database(&self, db_name: &str) -> Result<(), AppError> {
        self.check("drop_database")?;
        self.databases.lock().unwrap().remove(db_name);
        self.dropped.lock().unwrap().push(db_name.to_string());
        Ok(())
    }

    async fn rename_database(&self, from: &str, to: &str) -> Result<(), AppError> {
        self.check("rename_database")?;
        let mut dbs = self.databases.lock().unwrap();
        dbs.remove(from);
        dbs.insert(to.to_string());
        self.renamed.lock().unwrap().push((from.to_string(), to.to_string()));
        Ok(())
    }

    async fn apply_schema(&self, pool: &Arc<FakePool>) -> Result<(), AppError> {
        self.check("apply_schema")?;
        self.schemas.lock().unwrap().push(pool.db_name.clone());
        Ok(())
    }

    async fn seed(&self, pool: &Arc<FakePool>, _tenant: &Tenant, admin: &AdminSeed) -> Result<(), AppError> {
        self.check("seed")?;
        self.seeded
            .lock()
            .unwrap()
            .push((pool.db_name.clone(), admin.email.clone()));
        self.users.lock().unwrap().insert(
            pool.db_name.clone(),
            TenantUser {
                id: Uuid::new_v4(),
                email: admin.email.clone(),
                role: "admin".into(),
            },
        );
        Ok(())
    }

    async fn first_user(&self, pool: &Arc<FakePool>) -> Result<TenantUser, AppError> {
        self.users
            .lock()
            .unwrap()
            .get(&pool.db_name)
            .cloned()
            .ok_or_else(|| AppError::NotFound("no users found for tenant".into()))
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub state: AppState<FakeConnector>,
    pub registry: Arc<InMemoryRegistry>,
    pub admin: Arc<FakeAdmin>,
    pub connector: FakeConnector,
}

pub fn setup() -> Harness {
    setup_with(RetentionPolicy::Retain)
}

/// Fresh registry, pool cache and admin per call.
pub fn setup_with(retention: RetentionPolicy) -> Harness {
    let registry = Arc::new(InMemoryRegistry::default());
    let admin = Arc::new(FakeAdmin::default());
    let connector = FakeConnector::default();
    let settings = Settings {
        jwt_secret: TEST_SECRET.into(),
        retention,
        ..Settings::default()
    };
    let state = AppState::new(registry.clone(), connector.clone(), admin.clone(), settings);
    Harness {
        state,
        registry,
        admin,
        connector,
    }
}

pub fn tenant(subdomain: &str, status: TenantStatus) -> Tenant {
    let now = Utc::now();
    Tenant {
        id: Uuid::new_v4(),
        name: format!("{} Rentals", subdomain),
        subdomain: subdomain.to_string(),
        db_name: rental_saas::tenant::db_name_for_subdomain(subdomain),
        subscription_tier: SubscriptionTier::Normal,
        status,
        payment_method: None,
        logo_url: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn provision_request(subdomain: &str) -> ProvisionRequest {
    ProvisionRequest {
        name: format!("{} Rentals", subdomain),
        subdomain: subdomain.to_string(),
        admin_email: format!("Owner@{}.test", subdomain),
        admin_password: "s3cret-pass".into(),
        tier: "normal".into(),
        payment_method: None,
        logo_url: None,
    }
}

pub fn token(sub: &str, tenant_id: Option<String>, role: Option<&str>) -> String {
    let claims = Claims::new(sub, tenant_id, role.map(str::to_string), 3600);
    issue_token(&claims, TEST_SECRET).unwrap()
}
