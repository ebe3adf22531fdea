//! Operational roles, the coarse user types derived from them, and the
//! permissions granted to each role group by default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

/// Operational permission tier. `role` is the source of truth for
/// authorization; `UserType` is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SystemAdmin,
    DeptManager,
    Supervisor,
    CourseCoordinator,
    Trainer,
    Org,
    Ind,
}

impl Default for Role {
    fn default() -> Self {
        Role::Ind
    }
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::SystemAdmin,
        Role::DeptManager,
        Role::Supervisor,
        Role::CourseCoordinator,
        Role::Trainer,
        Role::Org,
        Role::Ind,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "SYSTEM_ADMIN",
            Role::DeptManager => "DEPT_MANAGER",
            Role::Supervisor => "SUPERVISOR",
            Role::CourseCoordinator => "COURSE_COORDINATOR",
            Role::Trainer => "TRAINER",
            Role::Org => "ORG",
            Role::Ind => "IND",
        }
    }

    /// Name of the group that mirrors this role.
    pub fn group_name(&self) -> &'static str {
        self.as_str()
    }

    /// Names of every role group. Group sync only ever touches these.
    pub fn group_names() -> Vec<String> {
        Self::ALL.iter().map(|r| r.group_name().to_string()).collect()
    }

    pub fn user_type(&self) -> UserType {
        match self {
            Role::SystemAdmin | Role::DeptManager | Role::Supervisor | Role::CourseCoordinator => {
                UserType::Staff
            }
            Role::Trainer => UserType::Trainer,
            Role::Org => UserType::Org,
            Role::Ind => UserType::Ind,
        }
    }

    /// Roles that can only be assigned by an administrator.
    pub fn is_restricted_for_self_signup(&self) -> bool {
        matches!(
            self,
            Role::Trainer
                | Role::DeptManager
                | Role::Supervisor
                | Role::CourseCoordinator
                | Role::SystemAdmin
        )
    }

    pub fn default_permissions(&self) -> BTreeSet<Permission> {
        match self {
            Role::SystemAdmin => Permission::ALL.into_iter().collect(),
            Role::DeptManager | Role::Supervisor => [
                Permission::ViewAllData,
                Permission::ManageCourses,
                Permission::ApproveCourses,
            ]
            .into_iter()
            .collect(),
            Role::CourseCoordinator => [Permission::ManageCourses].into_iter().collect(),
            Role::Trainer | Role::Org | Role::Ind => BTreeSet::new(),
        }
    }

    /// Route a user with this role lands on after login or activation.
    pub fn dashboard_route(&self) -> &'static str {
        match self {
            Role::Ind => "/individuals/dashboard",
            Role::Org => "/organizations/dashboard",
            _ => "/",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid role: {}", s))
    }
}

/// Coarse classification derived from `Role`; never set independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Org,
    Ind,
    Trainer,
    Staff,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Org => "ORG",
            UserType::Ind => "IND",
            UserType::Trainer => "TRAINER",
            UserType::Staff => "STAFF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ManageUsers,
    ViewAllData,
    ManageCourses,
    ApproveCourses,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::ManageUsers,
        Permission::ViewAllData,
        Permission::ManageCourses,
        Permission::ApproveCourses,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_roles_map_to_staff_user_type() {
        for role in [
            Role::SystemAdmin,
            Role::DeptManager,
            Role::Supervisor,
            Role::CourseCoordinator,
        ] {
            assert_eq!(role.user_type(), UserType::Staff);
        }
        assert_eq!(Role::Trainer.user_type(), UserType::Trainer);
        assert_eq!(Role::Org.user_type(), UserType::Org);
        assert_eq!(Role::Ind.user_type(), UserType::Ind);
    }

    #[test]
    fn only_ind_and_org_can_self_sign_up() {
        let open: Vec<Role> = Role::ALL
            .into_iter()
            .filter(|r| !r.is_restricted_for_self_signup())
            .collect();
        assert_eq!(open, vec![Role::Org, Role::Ind]);
    }

    #[test]
    fn role_round_trips_through_wire_name() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn default_permissions_per_role() {
        assert_eq!(Role::SystemAdmin.default_permissions().len(), 4);
        assert!(!Role::DeptManager
            .default_permissions()
            .contains(&Permission::ManageUsers));
        assert_eq!(
            Role::CourseCoordinator.default_permissions(),
            [Permission::ManageCourses].into_iter().collect()
        );
        assert!(Role::Ind.default_permissions().is_empty());
    }

    #[test]
    fn dashboards_route_by_role() {
        assert_eq!(Role::Ind.dashboard_route(), "/individuals/dashboard");
        assert_eq!(Role::Org.dashboard_route(), "/organizations/dashboard");
        assert_eq!(Role::Trainer.dashboard_route(), "/");
    }
}
