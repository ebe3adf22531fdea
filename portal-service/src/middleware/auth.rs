use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::models::{Role, User};
use crate::AppState;

/// The signed-in, active user behind the session cookie. Rejects with 401
/// when there is none.
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Pages reserved for one role answer 403 to everyone else.
    pub fn require_role(&self, role: Role, message: &str) -> Result<&User, AppError> {
        if self.0.role == role {
            Ok(&self.0)
        } else {
            tracing::info!(user_id = %self.0.user_id, role = %self.0.role, required = %role, "Role-guarded page refused");
            Err(AppError::Forbidden(anyhow::anyhow!(message.to_string())))
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session = state.sessions.load(&jar).await?;
        let user = state.accounts.current_user(&session.data).await?;
        Ok(CurrentUser(user))
    }
}
