use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

use super::role::Permission;

/// Named permission bundle. Each role has a group of the same name; other
/// groups may be assigned by administrators and are left alone by role sync.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Group {
    #[serde(rename = "_id")]
    pub name: String,
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}

impl Group {
    pub fn new(name: impl Into<String>, permissions: BTreeSet<Permission>) -> Self {
        Self {
            name: name.into(),
            permissions,
        }
    }
}
