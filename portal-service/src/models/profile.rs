use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

/// One-to-one extension of an `IND` user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualProfile {
    #[serde(rename = "_id")]
    pub profile_id: String,
    pub user_id: String,
    pub id_number: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl IndividualProfile {
    pub fn new(user_id: &str, id_number: &str) -> Self {
        Self {
            profile_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            id_number: id_number.trim().to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum OrganizationCategory {
    #[serde(rename = "GOV")]
    Government,
    #[serde(rename = "BUS")]
    Business,
    #[serde(rename = "ASSOC")]
    Association,
    #[serde(rename = "SCHOOLS")]
    Schools,
    #[serde(rename = "UNIV")]
    Universities,
}

impl OrganizationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationCategory::Government => "GOV",
            OrganizationCategory::Business => "BUS",
            OrganizationCategory::Association => "ASSOC",
            OrganizationCategory::Schools => "SCHOOLS",
            OrganizationCategory::Universities => "UNIV",
        }
    }
}

impl std::str::FromStr for OrganizationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GOV" => Ok(OrganizationCategory::Government),
            "BUS" => Ok(OrganizationCategory::Business),
            "ASSOC" => Ok(OrganizationCategory::Association),
            "SCHOOLS" => Ok(OrganizationCategory::Schools),
            "UNIV" => Ok(OrganizationCategory::Universities),
            _ => Err(format!("Invalid organization category: {}", s)),
        }
    }
}

/// One-to-one extension of an `ORG` user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationProfile {
    #[serde(rename = "_id")]
    pub profile_id: String,
    pub user_id: String,
    pub category: OrganizationCategory,
    pub org_name: String,
    pub representative_name: String,
    pub representative_phone: String,
    #[serde(default)]
    pub map_url: String,
    #[serde(default)]
    pub location_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Location fields as submitted, before they are attached to a profile.
#[derive(Debug, Clone, Default)]
pub struct OrganizationLocation {
    pub map_url: String,
    pub location_description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl OrganizationLocation {
    /// At least one of map URL, description or a full coordinate pair, and
    /// coordinates come in pairs.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.collect_errors(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Same checks as `validate`, added to an existing error set.
    pub fn collect_errors(&self, errors: &mut ValidationErrors) {
        let has_coords = self.latitude.is_some() && self.longitude.is_some();
        if self.map_url.trim().is_empty()
            && self.location_description.trim().is_empty()
            && !has_coords
        {
            let msg = "Provide a map link, a location description, or coordinates.";
            errors.add("map_url", location_error("location_required", msg));
            errors.add("location_description", location_error("location_required", msg));
        }

        if self.latitude.is_some() != self.longitude.is_some() {
            let msg = "Provide latitude and longitude together, or leave both empty.";
            errors.add("latitude", location_error("coordinates_pair", msg));
            errors.add("longitude", location_error("coordinates_pair", msg));
        }
    }
}

fn location_error(code: &'static str, msg: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(msg));
    err
}

impl OrganizationProfile {
    pub fn new(
        user_id: &str,
        category: OrganizationCategory,
        org_name: &str,
        representative_name: &str,
        representative_phone: &str,
        location: OrganizationLocation,
    ) -> Self {
        Self {
            profile_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            category,
            org_name: org_name.trim().to_string(),
            representative_name: representative_name.trim().to_string(),
            representative_phone: representative_phone.trim().to_string(),
            map_url: location.map_url.trim().to_string(),
            location_description: location.location_description.trim().to_string(),
            latitude: location.latitude,
            longitude: location.longitude,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_requires_at_least_one_field() {
        let err = OrganizationLocation::default().validate().unwrap_err();
        let fields = err.field_errors();
        assert!(fields.contains_key("map_url"));
        assert!(fields.contains_key("location_description"));

        let ok = OrganizationLocation {
            location_description: "Next to the main library".to_string(),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn coordinates_must_come_together() {
        let half = OrganizationLocation {
            map_url: "https://maps.example.com/x".to_string(),
            latitude: Some(24.7),
            ..Default::default()
        };
        let err = half.validate().unwrap_err();
        assert!(err.field_errors().contains_key("longitude"));

        let pair = OrganizationLocation {
            latitude: Some(24.7),
            longitude: Some(46.6),
            ..Default::default()
        };
        assert!(pair.validate().is_ok());
    }

    #[test]
    fn category_codes() {
        assert_eq!(
            "univ".parse::<OrganizationCategory>().unwrap(),
            OrganizationCategory::Universities
        );
        assert_eq!(
            serde_json::to_string(&OrganizationCategory::Association).unwrap(),
            "\"ASSOC\""
        );
        assert!("NGO".parse::<OrganizationCategory>().is_err());
    }
}
