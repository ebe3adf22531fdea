use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::{
    ContactMessage, IndividualProfile, OrganizationCategory, OrganizationProfile, OtpState, Role,
    SiteSetting, UserType,
};
use crate::services::store::Page;
use crate::utils::validation::{validate_not_blank, validate_optional_phone};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Matches email, full name or phone.
    pub q: Option<String>,
    pub role: Option<Role>,
    pub user_type: Option<UserType>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(
        length(max = 200, message = "Full name must be at most 200 characters."),
        custom(function = "validate_not_blank")
    )]
    pub full_name: String,

    #[validate(custom(function = "validate_optional_phone"))]
    pub phone: Option<String>,

    pub role: Role,

    /// Without a password the account cannot log in.
    pub password: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub is_superuser: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    #[validate(length(min = 1, max = 200, message = "Full name must be 1 to 200 characters."))]
    pub full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OtpListQuery {
    /// Email of the user the codes were issued to.
    pub email: Option<String>,
    pub is_used: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

/// Code metadata; the code itself is never exposed.
#[derive(Debug, Serialize, ToSchema)]
pub struct OtpResponse {
    pub otp_id: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub is_used: bool,
    pub state: OtpState,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileListQuery {
    /// Matches id number, organization or representative name.
    pub q: Option<String>,
    pub category: Option<OrganizationCategory>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

impl From<&PageQuery> for Page {
    fn from(q: &PageQuery) -> Self {
        Page {
            limit: q.limit,
            offset: q.offset,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IndividualProfileResponse {
    pub profile_id: String,
    pub user_id: String,
    pub id_number: String,
    pub created_at: DateTime<Utc>,
}

impl From<IndividualProfile> for IndividualProfileResponse {
    fn from(p: IndividualProfile) -> Self {
        Self {
            profile_id: p.profile_id,
            user_id: p.user_id,
            id_number: p.id_number,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationProfileResponse {
    pub profile_id: String,
    pub user_id: String,
    pub category: OrganizationCategory,
    pub org_name: String,
    pub representative_name: String,
    pub representative_phone: String,
    pub map_url: String,
    pub location_description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<OrganizationProfile> for OrganizationProfileResponse {
    fn from(p: OrganizationProfile) -> Self {
        Self {
            profile_id: p.profile_id,
            user_id: p.user_id,
            category: p.category,
            org_name: p.org_name,
            representative_name: p.representative_name,
            representative_phone: p.representative_phone,
            map_url: p.map_url,
            location_description: p.location_description,
            latitude: p.latitude,
            longitude: p.longitude,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactMessageResponse {
    pub message_id: String,
    pub reference: String,
    pub org_name: String,
    pub org_representative: String,
    pub phone: String,
    pub email: String,
    pub message: String,
    pub is_sent: bool,
    pub send_error: String,
    pub created_at: DateTime<Utc>,
}

impl From<ContactMessage> for ContactMessageResponse {
    fn from(m: ContactMessage) -> Self {
        Self {
            message_id: m.message_id,
            reference: m.reference,
            org_name: m.org_name,
            org_representative: m.org_representative,
            phone: m.phone,
            email: m.email,
            message: m.message,
            is_sent: m.is_sent,
            send_error: m.send_error,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SiteSettingResponse {
    pub contact_inbox_email: String,
    /// False while the configured fallback inbox is in use.
    pub stored: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SiteSettingResponse {
    pub fn from_setting(setting: Option<SiteSetting>, fallback_inbox: &str) -> Self {
        match setting {
            Some(s) => Self {
                contact_inbox_email: s.contact_inbox_email,
                stored: true,
                updated_at: Some(s.updated_at),
            },
            None => Self {
                contact_inbox_email: fallback_inbox.to_string(),
                stored: false,
                updated_at: None,
            },
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSiteSettingRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub contact_inbox_email: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BootstrapRolesRequest {
    /// Replace each role group's permissions with the defaults.
    #[serde(default)]
    pub reset: bool,
}
