use service_core::{
    axum::{
        extract::{Query, State},
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::{
        admin::{OtpListQuery, OtpResponse},
        ErrorResponse,
    },
    AppState,
};

/// Activation code metadata. Code hashes are never returned.
#[utoipa::path(
    get,
    path = "/admin/otps",
    params(OtpListQuery),
    responses(
        (status = 200, description = "Codes, newest first, with computed state", body = Vec<OtpResponse>),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn list_otps(
    State(state): State<AppState>,
    Query(query): Query<OtpListQuery>,
) -> Result<Json<Vec<OtpResponse>>, AppError> {
    Ok(Json(state.admin.list_otps(&query).await?))
}
