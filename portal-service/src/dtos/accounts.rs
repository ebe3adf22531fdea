use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidateUrl};

use crate::models::{Permission, Role, UserResponse, UserType};
use crate::utils::validation::{
    validate_id_number, validate_not_blank, validate_optional_phone, validate_otp_code,
    validate_phone,
};

/// Path the client should go to after signup.
pub const VERIFY_OTP_ROUTE: &str = "/accounts/verify-otp";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IndividualSignupForm {
    #[validate(email(message = "Enter a valid email address."))]
    #[schema(example = "sara@example.com")]
    pub email: String,

    #[validate(
        length(max = 200, message = "Full name must be at most 200 characters."),
        custom(function = "validate_not_blank")
    )]
    #[schema(example = "Sara Ali")]
    pub full_name: String,

    #[validate(custom(function = "validate_optional_phone"))]
    #[schema(example = "0501234567")]
    pub phone: Option<String>,

    #[validate(length(min = 1, message = "Password is required."))]
    pub password1: String,

    #[validate(length(min = 1, message = "Confirm your password."))]
    pub password2: String,

    #[validate(custom(function = "validate_id_number"))]
    #[schema(example = "1012345678")]
    pub id_number: String,

    /// Ignored unless it names the individual role; any other value is refused.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OrganizationSignupForm {
    #[validate(email(message = "Enter a valid email address."))]
    #[schema(example = "contact@acme.example")]
    pub email: String,

    #[validate(
        length(max = 200, message = "Full name must be at most 200 characters."),
        custom(function = "validate_not_blank")
    )]
    pub full_name: String,

    #[validate(custom(function = "validate_optional_phone"))]
    pub phone: Option<String>,

    #[validate(length(min = 1, message = "Password is required."))]
    pub password1: String,

    #[validate(length(min = 1, message = "Confirm your password."))]
    pub password2: String,

    /// One of GOV, BUS, ASSOC, SCHOOLS, UNIV.
    #[validate(custom(function = "validate_category"))]
    #[schema(example = "BUS")]
    pub category: String,

    #[validate(
        length(max = 255, message = "Organization name must be at most 255 characters."),
        custom(function = "validate_not_blank")
    )]
    #[schema(example = "Acme Training")]
    pub org_name: String,

    #[validate(
        length(max = 200, message = "Representative name must be at most 200 characters."),
        custom(function = "validate_not_blank")
    )]
    pub representative_name: String,

    #[validate(custom(function = "validate_phone"))]
    pub representative_phone: String,

    #[validate(custom(function = "validate_map_url"))]
    pub map_url: Option<String>,

    pub location_description: Option<String>,

    /// Decimal degrees; blank means not given.
    pub latitude: Option<String>,
    pub longitude: Option<String>,

    #[serde(default)]
    pub role: Option<String>,
}

fn validate_category(value: &str) -> Result<(), validator::ValidationError> {
    value
        .parse::<crate::models::OrganizationCategory>()
        .map(|_| ())
        .map_err(|_| {
            crate::utils::validation::invalid("category", "Choose a valid organization category.")
        })
}

/// Blank, or an absolute http(s) URL with a host.
fn validate_map_url(value: &str) -> Result<(), validator::ValidationError> {
    let value = value.trim();
    let web = value.starts_with("https://") || value.starts_with("http://");
    if value.is_empty() || (web && value.validate_url()) {
        Ok(())
    } else {
        Err(crate::utils::validation::invalid(
            "url",
            "Enter a valid URL.",
        ))
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    pub user_id: String,
    #[schema(example = "Account created. Enter the code we emailed you to activate it.")]
    pub message: String,
    /// False when the activation email could not be sent; a new code can be requested.
    pub email_sent: bool,
    #[schema(example = "/accounts/verify-otp")]
    pub next: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpForm {
    #[validate(custom(function = "validate_otp_code"))]
    #[schema(example = "004211")]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResendOtpResponse {
    pub message: String,
    pub email_sent: bool,
    /// Seconds before another code can be requested.
    pub retry_after_seconds: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginForm {
    /// Email address or 10-digit phone number.
    #[validate(custom(function = "validate_not_blank"))]
    #[schema(example = "sara@example.com")]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password is required."))]
    pub password: String,
}

/// Returned by login and by successful activation.
#[derive(Debug, Serialize, ToSchema)]
pub struct SignedInResponse {
    #[schema(example = "Welcome, Sara Ali")]
    pub message: String,
    pub display_name: String,
    #[schema(example = "/individuals/dashboard")]
    pub redirect_to: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Capabilities {
    pub can_manage_users: bool,
    pub can_view_all_data: bool,
    pub can_manage_courses: bool,
    pub can_approve_courses: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: UserResponse,
    pub user_type: UserType,
    pub role: Role,
    pub groups: Vec<String>,
    pub permissions: Vec<Permission>,
    pub capabilities: Capabilities,
    pub dashboard_route: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PageResponse {
    #[schema(example = "individual_dashboard")]
    pub page: String,
    pub display_name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn individual() -> IndividualSignupForm {
        IndividualSignupForm {
            email: "sara@example.com".into(),
            full_name: "Sara Ali".into(),
            phone: Some("".into()),
            password1: "Tr4ining!Harbor".into(),
            password2: "Tr4ining!Harbor".into(),
            id_number: "1012345678".into(),
            role: None,
        }
    }

    #[test]
    fn individual_form_accepts_blank_phone() {
        assert!(individual().validate().is_ok());
    }

    #[test]
    fn individual_form_reports_fields() {
        let mut form = individual();
        form.email = "not-an-email".into();
        form.full_name = "   ".into();
        form.id_number = "12".into();
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("full_name"));
        assert!(fields.contains_key("id_number"));
    }

    #[test]
    fn organization_form_checks_category_and_url() {
        let form = OrganizationSignupForm {
            email: "org@example.com".into(),
            full_name: "Omar".into(),
            phone: None,
            password1: "x".into(),
            password2: "x".into(),
            category: "SHOP".into(),
            org_name: "Acme".into(),
            representative_name: "Omar".into(),
            representative_phone: "0500000000".into(),
            map_url: Some("maps.example.com".into()),
            location_description: None,
            latitude: None,
            longitude: None,
            role: None,
        };
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("category"));
        assert!(fields.contains_key("map_url"));
    }

    #[test]
    fn map_url_must_be_a_real_web_address() {
        for good in ["", "  ", "https://maps.example.com/?q=acme", "http://example.com/place/1"] {
            assert!(validate_map_url(good).is_ok(), "{good:?} rejected");
        }
        for bad in ["http://", "http://not a url", "ftp-ish", "javascript:alert(1)", "https://"] {
            assert!(validate_map_url(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn otp_form_needs_six_digits() {
        assert!(VerifyOtpForm { code: "12345".into() }.validate().is_err());
        assert!(VerifyOtpForm { code: "012345".into() }.validate().is_ok());
    }
}
