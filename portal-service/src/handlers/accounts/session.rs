use axum_extra::extract::cookie::CookieJar;
use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use super::persist_session;
use crate::{
    dtos::{
        accounts::{Capabilities, LoginForm, MeResponse, MessageResponse, SignedInResponse},
        ErrorResponse,
    },
    middleware::CurrentUser,
    utils::ValidatedForm,
    AppState,
};

/// Log in with an email address or 10-digit phone number
#[utoipa::path(
    post,
    path = "/accounts/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Signed in", body = SignedInResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account not active yet", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many attempts from this IP", body = ErrorResponse)
    ),
    tag = "Accounts"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedForm(form): ValidatedForm<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut session = state.sessions.load(&jar).await?;
    let before = session.data.clone();
    let result = state
        .accounts
        .login(&form.identifier, &form.password, &mut session.data)
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
            message: format!("Welcome, {}", display_name),
            display_name,
            redirect_to: user.dashboard_route().to_string(),
            user: user.into(),
        }),
    ))
}

/// Log out and drop the session
#[utoipa::path(
    post,
    path = "/accounts/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    ),
    tag = "Accounts"
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.load(&jar).await?;
    if let Some(user_id) = &session.data.user_id {
        tracing::info!(user_id = %user_id, "User logged out");
    }
    let jar = state.sessions.destroy(jar, &session).await?;
    Ok((
        StatusCode::OK,
        jar,
        Json(MessageResponse {
            message: "You have been logged out.".to_string(),
        }),
    ))
}

/// Current user with derived type, groups and effective permissions
#[utoipa::path(
    get,
    path = "/accounts/me",
    responses(
        (status = 200, description = "Signed-in user", body = MeResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    tag = "Accounts"
)]
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MeResponse>, AppError> {
    let permissions = state.accounts.effective_permissions(&user).await?;
    let capabilities = Capabilities {
        can_manage_users: user.can_manage_users(&permissions),
        can_view_all_data: user.can_view_all_data(&permissions),
        can_manage_courses: user.can_manage_courses(&permissions),
        can_approve_courses: user.can_approve_courses(&permissions),
    };
    Ok(Json(MeResponse {
        user_type: user.user_type,
        role: user.role,
        groups: user.groups.clone(),
        permissions: permissions.into_iter().collect(),
        capabilities,
        dashboard_route: user.dashboard_route().to_string(),
        user: user.into(),
    }))
}
