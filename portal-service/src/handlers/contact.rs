use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::{
        contact::{ContactForm, ContactResponse},
        ErrorResponse,
    },
    utils::ValidatedForm,
    AppState,
};

/// Public contact form. The message is stored even when the notification
/// email cannot be delivered.
#[utoipa::path(
    post,
    path = "/contact",
    request_body(content = ContactForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Message received", body = ContactResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Contact"
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<ContactForm>,
) -> Result<impl IntoResponse, AppError> {
    let message = state.contact.submit(form).await?;
    Ok((
        StatusCode::CREATED,
        Json(ContactResponse {
            reference: message.reference,
            message: "Thank you. Your message has been received.".to_string(),
        }),
    ))
}
