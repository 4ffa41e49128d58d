//! Tenant data model: descriptor, subscription tier, provisioning status, and the
//! subdomain → database identifier derivation.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Subdomain of the platform-management tenant. Hidden from tenant listings and stats.
pub const PLATFORM_SUBDOMAIN: &str = "admin";

/// Labels that can never be registered as a tenant subdomain.
const RESERVED_SUBDOMAINS: &[&str] = &["www", PLATFORM_SUBDOMAIN];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Normal,
    Pro,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Normal => "normal",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Premium => "premium",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(SubscriptionTier::Normal),
            "pro" => Ok(SubscriptionTier::Pro),
            "premium" => Ok(SubscriptionTier::Premium),
            _ => Err(AppError::BadRequest(format!(
                "invalid subscription tier: {} (expected normal, pro or premium)",
                s
            ))),
        }
    }
}

/// Lifecycle of a registry row. Only `Active` tenants are resolvable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Provisioning,
    Active,
    /// Provisioning failed and compensation could not fully clean up.
    Failed,
    /// Deletion started. The row stays until the database has been dropped or archived.
    Deleting,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Provisioning => "provisioning",
            TenantStatus::Active => "active",
            TenantStatus::Failed => "failed",
            TenantStatus::Deleting => "deleting",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(TenantStatus::Provisioning),
            "active" => Ok(TenantStatus::Active),
            "failed" => Ok(TenantStatus::Failed),
            "deleting" => Ok(TenantStatus::Deleting),
            _ => Err(AppError::Internal(format!("unknown tenant status: {}", s))),
        }
    }
}

/// One isolated rental business, as recorded in the control-plane registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
    pub db_name: String,
    pub subscription_tier: SubscriptionTier,
    pub status: TenantStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// Input for a registry insert. The database identifier is derived, never supplied.
#[derive(Clone, Debug)]
pub struct NewTenant {
    pub name: String,
    pub subdomain: String,
    pub subscription_tier: SubscriptionTier,
    pub payment_method: Option<String>,
    pub logo_url: Option<String>,
}

impl NewTenant {
    pub fn db_name(&self) -> String {
        db_name_for_subdomain(&self.subdomain)
    }
}

/// One DNS label of at most 32 characters, so that `tenant_<subdomain>_archived_<secs>`
/// stays within PostgreSQL's 63-byte identifier limit.
const SUBDOMAIN_PATTERN: &str = r"^[a-z0-9](?:[a-z0-9-]{0,30}[a-z0-9])?$";

/// Registrable subdomain: one lowercase DNS label, not reserved.
pub fn validate_subdomain(subdomain: &str) -> Result<(), AppError> {
    let re = Regex::new(SUBDOMAIN_PATTERN)
        .map_err(|_| AppError::Internal("invalid subdomain pattern".into()))?;
    if !re.is_match(subdomain) {
        return Err(AppError::Validation(format!(
            "subdomain '{}' must be 1-32 lowercase letters, digits or inner hyphens",
            subdomain
        )));
    }
    if RESERVED_SUBDOMAINS.contains(&subdomain) {
        return Err(AppError::Validation(format!(
            "subdomain '{}' is reserved",
            subdomain
        )));
    }
    Ok(())
}

/// Physical database identifier for a subdomain. Deterministic; the result is a valid
/// unquoted PostgreSQL identifier for any subdomain accepted by [`validate_subdomain`].
pub fn db_name_for_subdomain(subdomain: &str) -> String {
    format!("tenant_{}", subdomain.replace('-', "_"))
}
