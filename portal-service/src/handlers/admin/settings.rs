use service_core::{
    axum::{extract::State, Json},
    error::AppError,
};

use crate::{
    dtos::{
        admin::{BootstrapRolesRequest, SiteSettingResponse, UpdateSiteSettingRequest},
        ErrorResponse,
    },
    services::roles::BootstrapReport,
    utils::ValidatedForm,
    AppState,
};

/// Current contact inbox and whether it comes from storage or configuration.
#[utoipa::path(
    get,
    path = "/admin/site-settings",
    responses(
        (status = 200, description = "Site setting", body = SiteSettingResponse),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn get_site_setting(
    State(state): State<AppState>,
) -> Result<Json<SiteSettingResponse>, AppError> {
    Ok(Json(state.admin.site_setting().await?))
}

#[utoipa::path(
    put,
    path = "/admin/site-settings",
    request_body = UpdateSiteSettingRequest,
    responses(
        (status = 200, description = "Site setting stored", body = SiteSettingResponse),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse),
        (status = 422, description = "Invalid email address", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn update_site_setting(
    State(state): State<AppState>,
    ValidatedForm(req): ValidatedForm<UpdateSiteSettingRequest>,
) -> Result<Json<SiteSettingResponse>, AppError> {
    Ok(Json(
        state
            .admin
            .update_site_setting(&req.contact_inbox_email)
            .await?,
    ))
}

/// Create the role groups and their default permissions. With `reset`,
/// existing groups get their permission sets replaced.
#[utoipa::path(
    post,
    path = "/admin/roles/bootstrap",
    request_body = BootstrapRolesRequest,
    responses(
        (status = 200, description = "Groups created or updated", body = BootstrapReport),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn bootstrap_roles(
    State(state): State<AppState>,
    req: Option<Json<BootstrapRolesRequest>>,
) -> Result<Json<BootstrapReport>, AppError> {
    let reset = req.map(|Json(r)| r.reset).unwrap_or(false);
    Ok(Json(state.admin.bootstrap_roles(reset).await?))
}
