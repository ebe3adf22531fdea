use axum_extra::extract::cookie::CookieJar;
use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use super::persist_session;
use crate::{
    dtos::{
        accounts::{IndividualSignupForm, OrganizationSignupForm, SignupResponse, VERIFY_OTP_ROUTE},
        ErrorResponse,
    },
    services::accounts::SignupOutcome,
    utils::ValidatedForm,
    AppState,
};

fn signup_response(outcome: SignupOutcome) -> SignupResponse {
    let message = if outcome.email_sent {
        "Account created. Enter the code we emailed you to activate it."
    } else {
        "Account created, but the activation email could not be sent. Request a new code."
    };
    SignupResponse {
        user_id: outcome.user.user_id,
        message: message.to_string(),
        email_sent: outcome.email_sent,
        next: VERIFY_OTP_ROUTE.to_string(),
    }
}

/// Sign up as an individual
#[utoipa::path(
    post,
    path = "/accounts/signup/individual",
    request_body(content = IndividualSignupForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Inactive account created and activation code sent", body = SignupResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 422, description = "Field errors", body = ErrorResponse),
        (status = 429, description = "Too many signups from this IP", body = ErrorResponse)
    ),
    tag = "Accounts"
)]
pub async fn signup_individual(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedForm(form): ValidatedForm<IndividualSignupForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut session = state.sessions.load(&jar).await?;
    let before = session.data.clone();
    let result = state
        .accounts
        .register_individual(form, &mut session.data)
        .await;
    let jar = persist_session(&state, jar, &session, &before).await?;
    let outcome = result?;
    Ok((StatusCode::CREATED, jar, Json(signup_response(outcome))))
}

/// Sign up as an organization
#[utoipa::path(
    post,
    path = "/accounts/signup/organization",
    request_body(content = OrganizationSignupForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Inactive account created and activation code sent", body = SignupResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 422, description = "Field errors", body = ErrorResponse),
        (status = 429, description = "Too many signups from this IP", body = ErrorResponse)
    ),
    tag = "Accounts"
)]
pub async fn signup_organization(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedForm(form): ValidatedForm<OrganizationSignupForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut session = state.sessions.load(&jar).await?;
    let before = session.data.clone();
    let result = state
        .accounts
        .register_organization(form, &mut session.data)
        .await;
    let jar = persist_session(&state, jar, &session, &before).await?;
    let outcome = result?;
    Ok((StatusCode::CREATED, jar, Json(signup_response(outcome))))
}
