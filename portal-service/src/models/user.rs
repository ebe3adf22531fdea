use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;

use super::role::{Permission, Role, UserType};

/// Identity record. Email and phone are unique at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    /// Absent rather than empty so the partial unique index ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    pub user_type: UserType,
    pub is_active: bool,
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    /// `None` marks an unusable password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date_joined: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "super::opt_chrono_datetime_as_bson_datetime"
    )]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// New users start inactive; activation happens through OTP verification
    /// or an administrator.
    pub fn new(
        email: String,
        full_name: String,
        phone: Option<String>,
        role: Role,
        password_hash: Option<String>,
    ) -> Self {
        let mut user = Self {
            user_id: Uuid::new_v4().to_string(),
            email,
            full_name: full_name.trim().to_string(),
            phone,
            role,
            user_type: role.user_type(),
            is_active: false,
            is_staff: false,
            is_superuser: false,
            password_hash,
            groups: Vec::new(),
            date_joined: Utc::now(),
            last_login: None,
        };
        user.normalize();
        user
    }

    /// Re-derive the fields that must never drift from `role`.
    pub fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
        self.phone = self
            .phone
            .take()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self.user_type = self.role.user_type();
        self.is_staff = self.role == Role::SystemAdmin || self.is_superuser;
    }

    pub fn has_usable_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_system_admin(&self) -> bool {
        self.role == Role::SystemAdmin || self.is_superuser
    }

    pub fn can_manage_users(&self, perms: &BTreeSet<Permission>) -> bool {
        self.is_system_admin() || perms.contains(&Permission::ManageUsers)
    }

    pub fn can_view_all_data(&self, perms: &BTreeSet<Permission>) -> bool {
        self.is_system_admin()
            || matches!(self.role, Role::DeptManager | Role::Supervisor)
            || perms.contains(&Permission::ViewAllData)
    }

    pub fn can_manage_courses(&self, perms: &BTreeSet<Permission>) -> bool {
        self.is_system_admin()
            || matches!(
                self.role,
                Role::DeptManager | Role::Supervisor | Role::CourseCoordinator
            )
            || perms.contains(&Permission::ManageCourses)
    }

    pub fn can_approve_courses(&self, perms: &BTreeSet<Permission>) -> bool {
        self.is_system_admin()
            || matches!(self.role, Role::DeptManager | Role::Supervisor)
            || perms.contains(&Permission::ApproveCourses)
    }

    /// Name used in greetings: full name, or email when the name is blank.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.email
        } else {
            &self.full_name
        }
    }

    pub fn dashboard_route(&self) -> &'static str {
        self.role.dashboard_route()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub user_type: UserType,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub has_usable_password: bool,
    pub groups: Vec<String>,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let has_usable_password = user.has_usable_password();
        Self {
            user_id: user.user_id,
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role,
            user_type: user.user_type,
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            has_usable_password,
            groups: user.groups,
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}
