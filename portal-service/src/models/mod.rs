pub mod contact;
pub mod email_otp;
pub mod group;
pub mod profile;
pub mod role;
pub mod session;
pub mod user;

pub use contact::{ContactMessage, SiteSetting};
pub use email_otp::{EmailOtp, OtpCheck, OtpState};
pub use group::Group;
pub use profile::{IndividualProfile, OrganizationCategory, OrganizationLocation, OrganizationProfile};
pub use role::{Permission, Role, UserType};
pub use session::SessionData;
pub use user::{User, UserResponse};

// Helper module for optional DateTime<Utc> as BSON DateTime
pub(crate) mod opt_chrono_datetime_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(dt) => bson::DateTime::from_chrono(*dt).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        Ok(opt.map(|dt| dt.to_chrono()))
    }
}
