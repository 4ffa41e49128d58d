//! OpenAPI document for the JSON bodies the API accepts and returns.

use crate::handlers::admin::{ImpersonatedUser, ImpersonationResponse, UpdateSubscriptionRequest};
use crate::handlers::tenant::PublicTenant;
use crate::provision::ProvisionRequest;
use crate::registry::TenantStats;
use crate::tenant::{SubscriptionTier, Tenant, TenantStatus};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "Rental SaaS API", description = "Multi-tenant car-rental platform"),
    components(schemas(
        Tenant,
        SubscriptionTier,
        TenantStatus,
        TenantStats,
        ProvisionRequest,
        UpdateSubscriptionRequest,
        ImpersonationResponse,
        ImpersonatedUser,
        PublicTenant,
    ))
)]
pub struct ApiDoc;
