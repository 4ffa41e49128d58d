//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Startup configuration errors. Never reach a client.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid database url: {0}")]
    DatabaseUrl(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("tenant database unavailable: {0}")]
    PoolUnavailable(String),
    #[error("provisioning of tenant {tenant_id} failed at step '{step}': {message}")]
    ProvisioningPartialFailure {
        tenant_id: String,
        step: &'static str,
        message: String,
    },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable category and HTTP status.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::PoolUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "pool_unavailable"),
            AppError::ProvisioningPartialFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "provisioning_failed")
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    /// Message safe to show a client. Server-side failures are reduced to a generic
    /// sentence; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::Conflict(m)
            | AppError::BadRequest(m)
            | AppError::Validation(m) => m.clone(),
            AppError::PoolUnavailable(_) => "tenant database is temporarily unavailable".into(),
            AppError::ProvisioningPartialFailure { step, .. } => {
                format!("tenant provisioning failed during {}", step)
            }
            AppError::Db(sqlx::Error::RowNotFound) => "resource not found".into(),
            AppError::Db(_) => "internal database error".into(),
            AppError::Internal(_) => "internal server error".into(),
        }
    }
}

/// Map a registry write failure: unique violations become `Conflict`.
pub fn conflict_on_unique(e: sqlx::Error, what: impl Into<String>) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::Conflict(what.into());
        }
    }
    AppError::Db(e)
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.public_message(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let e = AppError::NotFound("tenant not found".into());
        assert_eq!(e.status_and_code(), (StatusCode::NOT_FOUND, "not_found"));
        assert_eq!(e.public_message(), "tenant not found");
    }

    #[test]
    fn server_errors_hide_detail() {
        let e = AppError::PoolUnavailable("connect to tenant_acme at 10.0.0.3 refused".into());
        assert_eq!(
            e.status_and_code(),
            (StatusCode::SERVICE_UNAVAILABLE, "pool_unavailable")
        );
        assert!(!e.public_message().contains("tenant_acme"));

        let e = AppError::Db(sqlx::Error::PoolTimedOut);
        assert_eq!(e.status_and_code().1, "database_error");
        assert_eq!(e.public_message(), "internal database error");
    }

    #[test]
    fn provisioning_failure_names_step_only() {
        let e = AppError::ProvisioningPartialFailure {
            tenant_id: "7f1c".into(),
            step: "apply_schema",
            message: "syntax error near CREATE".into(),
        };
        assert_eq!(e.status_and_code().1, "provisioning_failed");
        assert_eq!(e.public_message(), "tenant provisioning failed during apply_schema");
    }

    #[test]
    fn row_not_found_is_404() {
        let e = AppError::Db(sqlx::Error::RowNotFound);
        assert_eq!(e.status_and_code().0, StatusCode::NOT_FOUND);
    }
}
