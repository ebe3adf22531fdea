use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message submitted through the public contact form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    #[serde(rename = "_id")]
    pub message_id: String,
    /// Human-facing reference quoted in the notification email.
    pub reference: String,
    pub org_name: String,
    #[serde(default)]
    pub org_representative: String,
    pub phone: String,
    pub email: String,
    pub message: String,
    pub is_sent: bool,
    #[serde(default)]
    pub send_error: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ContactMessage {
    pub fn new(
        reference: String,
        org_name: &str,
        org_representative: &str,
        phone: &str,
        email: &str,
        message: &str,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            reference,
            org_name: org_name.trim().to_string(),
            org_representative: org_representative.trim().to_string(),
            phone: phone.trim().to_string(),
            email: email.trim().to_lowercase(),
            message: message.trim().to_string(),
            is_sent: false,
            send_error: String::new(),
            created_at: Utc::now(),
        }
    }
}

pub const SITE_SETTING_ID: &str = "site";

/// Singleton holding editable site-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSetting {
    #[serde(rename = "_id")]
    pub setting_id: String,
    pub contact_inbox_email: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl SiteSetting {
    pub fn with_inbox(contact_inbox_email: &str) -> Self {
        Self {
            setting_id: SITE_SETTING_ID.to_string(),
            contact_inbox_email: contact_inbox_email.trim().to_string(),
            updated_at: Utc::now(),
        }
    }
}
