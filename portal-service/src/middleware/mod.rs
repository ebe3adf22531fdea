pub mod admin;
pub mod auth;
pub mod metrics;

pub use admin::{admin_auth_middleware, ADMIN_API_KEY_HEADER};
pub use auth::CurrentUser;
pub use metrics::metrics_middleware;
