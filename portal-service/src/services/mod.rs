//! Services layer for the portal.
//!
//! Business logic for signup, activation, login, role groups, the contact
//! form and administration, over the storage, session and email seams.

pub mod accounts;
pub mod admin;
pub mod contact;
mod database;
pub mod email;
pub mod error;
pub mod metrics;
pub mod otp;
pub mod redis;
pub mod roles;
pub mod session;
pub mod store;

pub use accounts::AccountService;
pub use admin::AdminService;
pub use contact::ContactService;
pub use database::MongoDb;
pub use email::{EmailMessage, EmailProvider, MockEmailService, SmtpEmailService};
pub use error::ServiceError;
pub use otp::OtpService;
pub use redis::{MockSessionStore, RedisService, SessionStore};
pub use roles::RoleService;
pub use session::{Session, SessionManager, SESSION_COOKIE};
pub use store::{MockStore, PortalStore};
