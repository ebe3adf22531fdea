use service_core::{
    axum::{
        extract::{Query, State},
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::{
        admin::{
            ContactMessageResponse, IndividualProfileResponse, OrganizationProfileResponse,
            PageQuery, ProfileListQuery,
        },
        ErrorResponse,
    },
    services::store::Page,
    AppState,
};

#[utoipa::path(
    get,
    path = "/admin/profiles/individuals",
    params(ProfileListQuery),
    responses(
        (status = 200, description = "Individual profiles", body = Vec<IndividualProfileResponse>),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn list_individual_profiles(
    State(state): State<AppState>,
    Query(query): Query<ProfileListQuery>,
) -> Result<Json<Vec<IndividualProfileResponse>>, AppError> {
    Ok(Json(state.admin.list_individual_profiles(&query).await?))
}

#[utoipa::path(
    get,
    path = "/admin/profiles/organizations",
    params(ProfileListQuery),
    responses(
        (status = 200, description = "Organization profiles", body = Vec<OrganizationProfileResponse>),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn list_organization_profiles(
    State(state): State<AppState>,
    Query(query): Query<ProfileListQuery>,
) -> Result<Json<Vec<OrganizationProfileResponse>>, AppError> {
    Ok(Json(state.admin.list_organization_profiles(&query).await?))
}

/// Contact form submissions with their delivery outcome.
#[utoipa::path(
    get,
    path = "/admin/contact-messages",
    params(PageQuery),
    responses(
        (status = 200, description = "Messages, newest first", body = Vec<ContactMessageResponse>),
        (status = 401, description = "Missing or wrong admin API key", body = ErrorResponse)
    ),
    security(("admin_api_key" = [])),
    tag = "Admin"
)]
pub async fn list_contact_messages(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ContactMessageResponse>>, AppError> {
    let page = Page::from(&query);
    Ok(Json(state.admin.list_contact_messages(&page).await?))
}
