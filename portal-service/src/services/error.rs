use service_core::error::AppError;
use std::borrow::Cow;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    /// A unique constraint rejected the write.
    #[error("{message}")]
    Conflict {
        field: &'static str,
        message: String,
    },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("This account is not active yet. Verify your email to activate it.")]
    AccountInactive,

    #[error("There is no account pending activation.")]
    NoPendingActivation,

    #[error("The account pending activation no longer exists. Please sign up again.")]
    PendingAccountMissing,

    #[error("No active verification code. Request a new code.")]
    NoPendingCode,

    #[error("The verification code has expired. Request a new code.")]
    CodeExpired,

    #[error("Too many wrong attempts. Request a new code.")]
    AttemptsExhausted,

    #[error("The verification code is incorrect.")]
    WrongCode,

    #[error("Please wait {retry_after} seconds before requesting a new code.")]
    ResendCooldown { retry_after: u64 },

    #[error("Authentication required")]
    NotAuthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl ServiceError {
    pub fn conflict(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Conflict {
            field,
            message: message.into(),
        }
    }

    /// Single field error, rendered the same way as form validation.
    pub fn field(field: &'static str, code: &'static str, message: &'static str) -> Self {
        let mut err = ValidationError::new(code);
        err.message = Some(Cow::Borrowed(message));
        let mut errors = ValidationErrors::new();
        errors.add(field, err);
        ServiceError::Validation(errors)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(e.into()),
            ServiceError::Redis(e) => AppError::RedisError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Validation(e) => AppError::ValidationError(e),
            ServiceError::Conflict { field, message } => {
                let mut e = ValidationError::new("unique");
                e.message = Some(Cow::Owned(message));
                let mut errors = ValidationErrors::new();
                errors.add(field, e);
                AppError::ValidationError(errors)
            }
            e @ ServiceError::InvalidCredentials => AppError::AuthError(anyhow::anyhow!(e.to_string())),
            e @ ServiceError::AccountInactive => AppError::Forbidden(anyhow::anyhow!(e.to_string())),
            e @ (ServiceError::NoPendingActivation
            | ServiceError::PendingAccountMissing
            | ServiceError::NoPendingCode
            | ServiceError::CodeExpired
            | ServiceError::AttemptsExhausted
            | ServiceError::WrongCode) => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            e @ ServiceError::ResendCooldown { retry_after } => {
                AppError::TooManyRequests(e.to_string(), Some(retry_after))
            }
            e @ ServiceError::NotAuthenticated => {
                AppError::Unauthorized(anyhow::anyhow!(e.to_string()))
            }
            ServiceError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            e @ ServiceError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
        }
    }
}

/// True when a MongoDB error is a unique index violation (E11000).
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::BulkWrite(failure) => failure
            .write_errors
            .as_ref()
            .is_some_and(|errs| errs.iter().any(|e| e.code == 11000)),
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};

    fn status(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn otp_failures_are_bad_requests_with_distinct_messages() {
        let errs = [
            ServiceError::NoPendingCode,
            ServiceError::CodeExpired,
            ServiceError::AttemptsExhausted,
            ServiceError::WrongCode,
        ];
        let messages: std::collections::HashSet<String> =
            errs.iter().map(|e| e.to_string()).collect();
        assert_eq!(messages.len(), errs.len());
        for e in errs {
            assert_eq!(status(e), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn inactive_account_is_distinct_from_bad_credentials() {
        assert_ne!(
            ServiceError::AccountInactive.to_string(),
            ServiceError::InvalidCredentials.to_string()
        );
        assert_eq!(status(ServiceError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(ServiceError::AccountInactive), StatusCode::FORBIDDEN);
    }

    #[test]
    fn conflict_renders_as_field_error() {
        assert_eq!(
            status(ServiceError::conflict("email", "Email already registered")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn cooldown_is_too_many_requests() {
        assert_eq!(
            status(ServiceError::ResendCooldown { retry_after: 30 }),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
