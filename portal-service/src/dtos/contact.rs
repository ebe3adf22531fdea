use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::utils::validation::{validate_not_blank, validate_phone};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ContactForm {
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
    pub org_representative: String,

    #[validate(custom(function = "validate_phone"))]
    #[schema(example = "0501234567")]
    pub phone: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(
        length(max = 5000, message = "Message must be at most 5000 characters."),
        custom(function = "validate_not_blank")
    )]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ContactResponse {
    #[schema(example = "PORTAL-000042")]
    pub reference: String,
    pub message: String,
}
