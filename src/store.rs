//! Control-plane DDL, physical tenant database administration and the tenant schema.
//! Every statement here is idempotent so a half-finished provisioning can be retried.

use crate::error::AppError;
use sqlx::{PgConnection, PgPool};

/// Create the control-plane `tenants` registry table if missing.
pub async fn ensure_registry_tables(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            subdomain TEXT NOT NULL UNIQUE,
            db_name TEXT NOT NULL UNIQUE,
            subscription_tier TEXT NOT NULL DEFAULT 'normal',
            payment_method TEXT,
            logo_url TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;
    // Registries created before provisioning status existed.
    sqlx::query("ALTER TABLE tenants ADD COLUMN IF NOT EXISTS status TEXT NOT NULL DEFAULT 'active'")
        .execute(pool)
        .await?;
    Ok(())
}

/// Whether a physical database with this name exists on the server.
pub async fn database_exists(conn: &mut PgConnection, db_name: &str) -> Result<bool, AppError> {
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(db_name)
        .fetch_one(conn)
        .await?;
    Ok(exists.0)
}

/// `CREATE DATABASE` unless it already exists. Returns true when this call created it.
pub async fn create_database(conn: &mut PgConnection, db_name: &str) -> Result<bool, AppError> {
    if database_exists(&mut *conn, db_name).await? {
        return Ok(false);
    }
    sqlx::query(&format!("CREATE DATABASE {}", quote_ident(db_name)))
        .execute(&mut *conn)
        .await?;
    Ok(true)
}

/// `DROP DATABASE IF EXISTS ... WITH (FORCE)`; terminates stray sessions from other instances.
pub async fn drop_database(conn: &mut PgConnection, db_name: &str) -> Result<(), AppError> {
    sqlx::query(&format!(
        "DROP DATABASE IF EXISTS {} WITH (FORCE)",
        quote_ident(db_name)
    ))
    .execute(conn)
    .await?;
    Ok(())
}

/// Rename a database out of the way, keeping its data.
pub async fn rename_database(conn: &mut PgConnection, from: &str, to: &str) -> Result<(), AppError> {
    sqlx::query(&format!(
        "ALTER DATABASE {} RENAME TO {}",
        quote_ident(from),
        quote_ident(to)
    ))
    .execute(conn)
    .await?;
    Ok(())
}

/// Operational tables of one tenant database. The `tenants` table mirrors the tenant's own
/// registry row so tenant-scoped foreign keys resolve locally.
const TENANT_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS tenants (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        subdomain TEXT NOT NULL UNIQUE,
        db_name TEXT NOT NULL,
        subscription_tier TEXT NOT NULL DEFAULT 'normal',
        logo_url TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS roles (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        role_id UUID REFERENCES roles(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS cars (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        brand TEXT NOT NULL,
        model TEXT NOT NULL,
        year INT,
        license_plate TEXT NOT NULL,
        price_per_day NUMERIC(10, 2) NOT NULL,
        currency TEXT NOT NULL DEFAULT 'EUR',
        status TEXT NOT NULL DEFAULT 'available',
        image_url TEXT,
        images JSONB NOT NULL DEFAULT '[]',
        transmission TEXT,
        fuel_type TEXT,
        seats INT,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (tenant_id, license_plate)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS customers (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        address TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS bookings (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        car_id UUID NOT NULL REFERENCES cars(id),
        customer_id UUID NOT NULL REFERENCES customers(id),
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        price_per_day NUMERIC(10, 2) NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CHECK (end_date >= start_date)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS expenses (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        amount NUMERIC(10, 2) NOT NULL,
        category TEXT NOT NULL,
        date DATE NOT NULL,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS invoices (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        booking_id UUID REFERENCES bookings(id),
        amount NUMERIC(10, 2) NOT NULL,
        status TEXT NOT NULL DEFAULT 'unpaid',
        due_date DATE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS notifications (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        user_id UUID REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        type TEXT NOT NULL DEFAULT 'info',
        is_read BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS branding (
        tenant_id UUID PRIMARY KEY REFERENCES tenants(id) ON DELETE CASCADE,
        logo_url TEXT,
        primary_color TEXT,
        secondary_color TEXT,
        accent_color TEXT,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS landing_pages (
        tenant_id UUID PRIMARY KEY REFERENCES tenants(id) ON DELETE CASCADE,
        content JSONB NOT NULL DEFAULT '{}',
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS booking_requests (
        id UUID PRIMARY KEY,
        tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
        car_id UUID REFERENCES cars(id) ON DELETE SET NULL,
        customer_name TEXT NOT NULL,
        customer_email TEXT NOT NULL,
        customer_phone TEXT,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        message TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
];

/// Apply the tenant schema to a freshly created (or partially migrated) tenant database.
pub async fn apply_tenant_schema(pool: &PgPool) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for ddl in TENANT_SCHEMA {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
