use axum::{
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Request body accepted either as an HTML form post
/// (`application/x-www-form-urlencoded`) or as JSON, then validated.
/// Validation failures surface as field-level 422 errors.
pub struct ValidatedForm<T>(pub T);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedForm<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = if is_form(&req) {
            let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Form parse error: {}", e.body_text()))
            })?;
            value
        } else {
            let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e.body_text()))
            })?;
            value
        };

        value.validate()?;
        Ok(ValidatedForm(value))
    }
}

pub(crate) fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Exactly ten ASCII digits.
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    if value.len() == 10 && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid("phone", "Phone number must be exactly 10 digits."))
    }
}

/// Optional phone: blank is allowed and treated as absent.
pub fn validate_optional_phone(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Ok(());
    }
    validate_phone(value.trim())
}

/// National id: 10 to 20 digits.
pub fn validate_id_number(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid("required", "ID number is required."));
    }
    if (10..=20).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid("id_number", "ID number must be 10 to 20 digits."))
    }
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(invalid("required", "This field is required."))
    } else {
        Ok(())
    }
}

/// Activation code: exactly six digits.
pub fn validate_otp_code(value: &str) -> Result<(), ValidationError> {
    if crate::models::email_otp::is_well_formed(value.trim()) {
        Ok(())
    } else {
        Err(invalid("code", "Enter the 6-digit code."))
    }
}
