use service_core::{
    axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        response::IntoResponse,
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::{
        admin::{CreateUserRequest, UpdateUserRequest, UserListQuery},
        ErrorResponse,
    },
    models::UserResponse,
    utils::ValidatedForm,
    AppState,
};

/// Search users by email, name or phone, with optional filters.
#[utoipa::path(
    get,
    path = "/admin/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Matching users, newest first", body = Vec<UserResponse>),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.admin.list_users(&query).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/users/{user_id}",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.admin.get_user(&user_id).await?;
    Ok(Json(user.into()))
}

/// Create a user with any role. Restricted staff roles can only be
/// assigned here.
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse),
        (status = 422, description = "Validation error or duplicate email/phone", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedForm(req): ValidatedForm<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.admin.create_user(req).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Change role, active flag or full name. Derived fields and role groups
/// are resynchronized.
#[utoipa::path(
    patch,
    path = "/admin/users/{user_id}",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ValidatedForm(req): ValidatedForm<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.admin.update_user(&user_id, req).await?;
    Ok(Json(user.into()))
}
