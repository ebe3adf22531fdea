pub mod activation;
pub mod registration;
pub mod session;

pub use activation::{resend_otp, verify_otp};
pub use registration::{signup_individual, signup_organization};
pub use session::{login, logout, me};

use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::models::SessionData;
use crate::services::Session;
use crate::AppState;

/// Write the session back when it changed, or when it already existed so
/// its expiry is refreshed. Untouched fresh sessions are not stored.
pub(crate) async fn persist_session(
    state: &AppState,
    jar: CookieJar,
    session: &Session,
    before: &SessionData,
) -> Result<CookieJar, AppError> {
    if session.existing || session.data != *before {
        Ok(state.sessions.save(jar, session).await?)
    } else {
        Ok(jar)
    }
}
