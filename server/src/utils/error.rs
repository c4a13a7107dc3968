use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::utils::response::error as error_response;

/// Postgres SQLSTATE codes we translate into user-facing messages.
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";
const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_INSUFFICIENT_PRIVILEGE: &str = "42501";

/// A single field-level problem in a submitted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Form has {} invalid field(s)", .0.len())]
    InvalidForm(Vec<FieldError>),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No registration matched payment {payment_id}")]
    PaymentNotRecorded { payment_id: String },

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

/// How a database failure is presented to the client.
struct DatabaseFailure {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
}

fn classify_database_error(err: &sqlx::Error) -> DatabaseFailure {
    if matches!(err, sqlx::Error::RowNotFound) {
        return DatabaseFailure {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: "The requested record does not exist",
        };
    }

    let sqlstate = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    match sqlstate.as_deref() {
        Some(PG_FOREIGN_KEY_VIOLATION) => DatabaseFailure {
            status: StatusCode::CONFLICT,
            code: "FOREIGN_KEY_VIOLATION",
            message: "The record is linked to other records that do not allow this change",
        },
        Some(PG_UNIQUE_VIOLATION) => DatabaseFailure {
            status: StatusCode::CONFLICT,
            code: "DUPLICATE_RECORD",
            message: "A record with the same identity already exists",
        },
        Some(PG_INSUFFICIENT_PRIVILEGE) => DatabaseFailure {
            status: StatusCode::FORBIDDEN,
            code: "PERMISSION_DENIED",
            message: "You do not have permission to perform this action",
        },
        _ => DatabaseFailure {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "DATABASE_ERROR",
            message: "A database error occurred",
        },
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidForm(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PaymentNotRecorded { .. } => StatusCode::CONFLICT,
            AppError::DatabaseError(e) => classify_database_error(e).status,
            AppError::MigrationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidForm(_) => "INVALID_FORM",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PaymentNotRecorded { .. } => "PAYMENT_NOT_RECORDED",
            AppError::DatabaseError(e) => classify_database_error(e).code,
            AppError::MigrationError(_) => "MIGRATION_ERROR",
            AppError::ExternalServiceError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::ConfigError(_) => "CONFIG_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => {
                tracing::debug!(error = ?self, message = %msg, "Request rejected");
            }
            AppError::InvalidForm(fields) => {
                tracing::debug!(invalid_fields = fields.len(), "Form submission rejected");
            }
            AppError::PaymentNotRecorded { payment_id } => {
                error!(payment_id = %payment_id, "Verified payment matched no registration");
            }
            AppError::ExternalServiceError(msg)
            | AppError::ConfigError(msg)
            | AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::MigrationError(e) => {
                error!(error = ?e, "Migration error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Only expose high-level message to the client
        let (public_message, details) = match &self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ExternalServiceError(msg) => (msg.clone(), None),
            AppError::InvalidForm(fields) => (
                "Please fix the highlighted fields".to_string(),
                serde_json::to_value(fields).ok(),
            ),
            AppError::PaymentNotRecorded { payment_id } => (
                format!(
                    "Payment {} could not be matched to your registration. Keep this id and contact the organizers.",
                    payment_id
                ),
                Some(serde_json::json!({ "payment_id": payment_id })),
            ),
            AppError::DatabaseError(e) => (classify_database_error(e).message.to_string(), None),
            AppError::MigrationError(_)
            | AppError::ConfigError(_)
            | AppError::InternalServerError(_) => ("Internal server error".to_string(), None),
        };

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_not_recorded_names_payment() {
        let err = AppError::PaymentNotRecorded {
            payment_id: "pay_1".to_string(),
        };
        assert!(err.to_string().contains("pay_1"));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "PAYMENT_NOT_RECORDED");
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_form_is_unprocessable() {
        let err = AppError::InvalidForm(vec![FieldError::new("Name", "Name is required")]);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "Form has 1 invalid field(s)");
    }
}
