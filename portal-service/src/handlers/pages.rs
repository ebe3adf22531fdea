//! Role-gated landing pages. The front end renders them; these endpoints
//! decide who may see which page.

use service_core::{axum::Json, error::AppError};

use crate::{
    dtos::{accounts::PageResponse, ErrorResponse},
    middleware::CurrentUser,
    models::Role,
};

const INDIVIDUALS_ONLY: &str = "This page is for individuals only.";
const ORGANIZATIONS_ONLY: &str = "This page is for organizations only.";

fn page_for(user: &CurrentUser, role: Role, message: &str, page: &str) -> Result<Json<PageResponse>, AppError> {
    let user = user.require_role(role, message)?;
    Ok(Json(PageResponse {
        page: page.to_string(),
        display_name: user.display_name().to_string(),
        role: user.role,
    }))
}

#[utoipa::path(
    get,
    path = "/individuals/dashboard",
    responses(
        (status = 200, description = "Individual dashboard", body = PageResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Signed in with another role", body = ErrorResponse)
    ),
    tag = "Pages"
)]
pub async fn individual_dashboard(user: CurrentUser) -> Result<Json<PageResponse>, AppError> {
    page_for(&user, Role::Ind, INDIVIDUALS_ONLY, "individual_dashboard")
}

#[utoipa::path(
    get,
    path = "/organizations/dashboard",
    responses(
        (status = 200, description = "Organization dashboard", body = PageResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Signed in with another role", body = ErrorResponse)
    ),
    tag = "Pages"
)]
pub async fn organization_dashboard(user: CurrentUser) -> Result<Json<PageResponse>, AppError> {
    page_for(&user, Role::Org, ORGANIZATIONS_ONLY, "organization_dashboard")
}

#[utoipa::path(
    get,
    path = "/support/tickets/new",
    responses(
        (status = 200, description = "New support ticket page", body = PageResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Signed in with another role", body = ErrorResponse)
    ),
    tag = "Pages"
)]
pub async fn new_support_ticket(user: CurrentUser) -> Result<Json<PageResponse>, AppError> {
    page_for(&user, Role::Ind, INDIVIDUALS_ONLY, "support_ticket_new")
}

#[utoipa::path(
    get,
    path = "/support/tickets",
    responses(
        (status = 200, description = "Support ticket list page", body = PageResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Signed in with another role", body = ErrorResponse)
    ),
    tag = "Pages"
)]
pub async fn support_tickets(user: CurrentUser) -> Result<Json<PageResponse>, AppError> {
    page_for(&user, Role::Ind, INDIVIDUALS_ONLY, "support_ticket_list")
}
