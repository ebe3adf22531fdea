//! Back-office endpoints. Every route here sits behind the admin API key.

pub mod otps;
pub mod profiles;
pub mod settings;
pub mod users;

pub use otps::list_otps;
pub use profiles::{list_contact_messages, list_individual_profiles, list_organization_profiles};
pub use settings::{bootstrap_roles, get_site_setting, update_site_setting};
pub use users::{create_user, get_user, list_users, update_user};
