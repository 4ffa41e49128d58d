//! HTTP handlers: tenant administration and tenant-scoped endpoints.

pub mod admin;
pub mod tenant;

use crate::error::AppError;
use uuid::Uuid;

fn parse_tenant_id(id_str: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid tenant id".into()))
}
