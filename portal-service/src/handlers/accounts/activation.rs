use axum_extra::extract::cookie::CookieJar;
use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use super::persist_session;
use crate::{
    dtos::{
        accounts::{ResendOtpResponse, SignedInResponse, VerifyOtpForm},
        ErrorResponse,
    },
    utils::ValidatedForm,
    AppState,
};

/// Submit the emailed activation code
#[utoipa::path(
    post,
    path = "/accounts/verify-otp",
    request_body(content = VerifyOtpForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Account activated and signed in", body = SignedInResponse),
        (status = 400, description = "No pending account, no pending code, expired, exhausted or wrong code", body = ErrorResponse),
        (status = 422, description = "Code is not 6 digits", body = ErrorResponse)
    ),
    tag = "Accounts"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedForm(form): ValidatedForm<VerifyOtpForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut session = state.sessions.load(&jar).await?;
    let before = session.data.clone();
    let result = state
        .accounts
        .verify_activation(&form.code, &mut session.data)
        .await;
    if result.is_ok() {
        state.sessions.rotate(&mut session).await?;
    }
    let jar = persist_session(&state, jar, &session, &before).await?;
    let user = result?;

    let display_name = user.display_name().to_string();
    Ok((
        StatusCode::OK,
        jar,
        Json(SignedInResponse {
            message: format!("Your account is active. Welcome, {}", display_name),
            display_name,
            redirect_to: user.dashboard_route().to_string(),
            user: user.into(),
        }),
    ))
}

/// Request a new activation code
#[utoipa::path(
    post,
    path = "/accounts/resend-otp",
    responses(
        (status = 200, description = "New code issued", body = ResendOtpResponse),
        (status = 400, description = "No account pending activation", body = ErrorResponse),
        (status = 429, description = "Requested again within the cooldown", body = ErrorResponse)
    ),
    tag = "Accounts"
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let mut session = state.sessions.load(&jar).await?;
    let before = session.data.clone();
    let result = state.accounts.resend_activation(&mut session.data).await;
    let jar = persist_session(&state, jar, &session, &before).await?;
    let outcome = result?;

    let message = if outcome.email_sent {
        "A new code has been sent to your email."
    } else {
        "A new code was created but the email could not be sent. Try again shortly."
    };
    Ok((
        StatusCode::OK,
        jar,
        Json(ResendOtpResponse {
            message: message.to_string(),
            email_sent: outcome.email_sent,
            retry_after_seconds: outcome.retry_after_seconds,
        }),
    ))
}
