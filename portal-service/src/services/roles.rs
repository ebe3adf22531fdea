//! Role groups: one group per role carrying that role's default
//! permissions, with user membership kept in step with `User::role`.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use utoipa::ToSchema;

use super::error::ServiceError;
use super::store::PortalStore;
use crate::models::{Group, Permission, Role, User};

#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn PortalStore>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BootstrapReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub reset: bool,
}

/// Group list after sync: every role group other than `role` removed, the
/// role group present, everything else untouched and in its original order.
pub fn synced_groups(current: &[String], role: Role) -> Vec<String> {
    let role_groups = Role::group_names();
    let mut groups: Vec<String> = current
        .iter()
        .filter(|g| !role_groups.contains(g) || g.as_str() == role.group_name())
        .cloned()
        .collect();
    groups.dedup();
    if !groups.iter().any(|g| g == role.group_name()) {
        groups.push(role.group_name().to_string());
    }
    groups
}

impl RoleService {
    pub fn new(store: Arc<dyn PortalStore>) -> Self {
        Self { store }
    }

    /// Bring the user's role-group membership in line with its role.
    pub async fn sync_user_groups(&self, user: &mut User) -> Result<(), ServiceError> {
        let desired = synced_groups(&user.groups, user.role);
        if desired == user.groups {
            return Ok(());
        }
        if self.store.find_group(user.role.group_name()).await?.is_none() {
            self.store
                .upsert_group(&Group::new(
                    user.role.group_name(),
                    user.role.default_permissions(),
                ))
                .await?;
        }
        self.store.set_user_groups(&user.user_id, &desired).await?;
        user.groups = desired;
        Ok(())
    }

    /// Reaction to every user write. Failures are logged and swallowed so the
    /// write that triggered it stands.
    pub async fn on_user_saved(&self, user: &mut User) {
        if let Err(e) = self.sync_user_groups(user).await {
            tracing::error!(
                user_id = %user.user_id,
                role = %user.role,
                error = %e,
                "Role group sync failed"
            );
        }
    }

    /// Union of the permissions of every group the user belongs to.
    pub async fn effective_permissions(
        &self,
        user: &User,
    ) -> Result<BTreeSet<Permission>, ServiceError> {
        let groups = self.store.find_groups(&user.groups).await?;
        Ok(groups.into_iter().flat_map(|g| g.permissions).collect())
    }

    /// Ensure one group per role. With `reset`, each role group's
    /// permissions are replaced by the defaults; otherwise missing defaults
    /// are added and extra grants kept.
    pub async fn bootstrap_roles(&self, reset: bool) -> Result<BootstrapReport, ServiceError> {
        let mut report = BootstrapReport {
            created: Vec::new(),
            updated: Vec::new(),
            reset,
        };

        for role in Role::ALL {
            let defaults = role.default_permissions();
            match self.store.find_group(role.group_name()).await? {
                None => {
                    self.store
                        .upsert_group(&Group::new(role.group_name(), defaults))
                        .await?;
                    report.created.push(role.group_name().to_string());
                }
                Some(mut group) => {
                    let next = if reset {
                        defaults
                    } else {
                        group.permissions.union(&defaults).copied().collect()
                    };
                    if next != group.permissions {
                        group.permissions = next;
                        self.store.upsert_group(&group).await?;
                        report.updated.push(role.group_name().to_string());
                    }
                }
            }
        }

        tracing::info!(
            created = report.created.len(),
            updated = report.updated.len(),
            reset,
            "Role groups bootstrapped"
        );
        Ok(report)
    }
}
