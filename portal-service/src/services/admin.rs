use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use validator::ValidationErrors;

use super::accounts::AccountService;
use super::contact::ContactService;
use super::error::ServiceError;
use super::roles::{BootstrapReport, RoleService};
use super::store::{OtpQuery, Page, PortalStore, ProfileQuery, UserQuery};
use crate::dtos::admin::{
    ContactMessageResponse, CreateUserRequest, IndividualProfileResponse, OrganizationProfileResponse,
    OtpListQuery, OtpResponse, ProfileListQuery, SiteSettingResponse, UpdateUserRequest,
    UserListQuery,
};
use crate::models::user::normalize_email;
use crate::models::{OtpState, SiteSetting, User};
use crate::utils::validation::invalid;
use crate::utils::{hash_password, password_policy_errors, Password};

/// Back-office operations behind the admin API key.
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn PortalStore>,
    accounts: AccountService,
    roles: RoleService,
    contact: ContactService,
    otp_max_attempts: u32,
}

impl AdminService {
    pub fn new(
        store: Arc<dyn PortalStore>,
        accounts: AccountService,
        roles: RoleService,
        contact: ContactService,
        otp_max_attempts: u32,
    ) -> Self {
        Self {
            store,
            accounts,
            roles,
            contact,
            otp_max_attempts,
        }
    }

    pub async fn list_users(&self, query: &UserListQuery) -> Result<Vec<User>, ServiceError> {
        self.store
            .search_users(&UserQuery {
                search: query.q.clone().filter(|q| !q.trim().is_empty()),
                role: query.role,
                user_type: query.user_type,
                is_active: query.is_active,
                is_staff: query.is_staff,
                page: Page {
                    limit: query.limit,
                    offset: query.offset,
                },
            })
            .await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, ServiceError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))
    }

    /// Create a user with any role, restricted ones included. Active unless
    /// the request says otherwise.
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, ServiceError> {
        let mut errors = ValidationErrors::new();

        if self
            .store
            .find_user_by_email(&normalize_email(&req.email))
            .await?
            .is_some()
        {
            errors.add("email", invalid("unique", "A user with this email already exists."));
        }
        let phone = req
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        if let Some(phone) = &phone {
            if self.store.find_user_by_phone(phone).await?.is_some() {
                errors.add(
                    "phone",
                    invalid("unique", "A user with this phone number already exists."),
                );
            }
        }
        if let Some(password) = &req.password {
            for err in password_policy_errors(password, &[&req.email, &req.full_name]) {
                errors.add("password", err);
            }
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let password_hash = match &req.password {
            Some(password) => Some(
                hash_password(&Password::new(password.clone()))
                    .map_err(|e| {
                        ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
                    })?
                    .into_string(),
            ),
            None => None,
        };

        let mut user = User::new(req.email, req.full_name, phone, req.role, password_hash);
        user.is_active = req.is_active;
        user.is_superuser = req.is_superuser;
        self.accounts.create_user(&mut user).await?;

        tracing::info!(user_id = %user.user_id, role = %user.role, "User created by administrator");
        Ok(user)
    }

    /// Change role, active flag or name. Goes through the normal save path so
    /// derived fields and role groups follow.
    pub async fn update_user(
        &self,
        user_id: &str,
        req: UpdateUserRequest,
    ) -> Result<User, ServiceError> {
        let mut user = self.get_user(user_id).await?;
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(is_active) = req.is_active {
            user.is_active = is_active;
        }
        if let Some(full_name) = req.full_name {
            user.full_name = full_name.trim().to_string();
        }
        self.accounts.save_user(&mut user).await?;

        tracing::info!(
            user_id = %user.user_id,
            role = %user.role,
            is_active = user.is_active,
            "User updated by administrator"
        );
        Ok(user)
    }

    /// Code metadata with a computed state. Codes older than the newest one
    /// for the same user show as superseded.
    pub async fn list_otps(&self, query: &OtpListQuery) -> Result<Vec<OtpResponse>, ServiceError> {
        let user_id = match query.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => match self.store.find_user_by_email(&normalize_email(email)).await? {
                Some(user) => Some(user.user_id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let otps = self
            .store
            .search_otps(&OtpQuery {
                user_id,
                is_used: query.is_used,
                page: Page {
                    limit: query.limit,
                    offset: query.offset,
                },
            })
            .await?;

        let now = Utc::now();
        let mut latest: HashMap<String, Option<String>> = HashMap::new();
        let mut emails: HashMap<String, Option<String>> = HashMap::new();
        let mut out = Vec::with_capacity(otps.len());

        for otp in otps {
            if !latest.contains_key(&otp.user_id) {
                let newest = self
                    .store
                    .find_latest_otp(&otp.user_id)
                    .await?
                    .map(|o| o.otp_id);
                latest.insert(otp.user_id.clone(), newest);
            }
            if !emails.contains_key(&otp.user_id) {
                let email = self
                    .store
                    .find_user_by_id(&otp.user_id)
                    .await?
                    .map(|u| u.email);
                emails.insert(otp.user_id.clone(), email);
            }

            let is_newest = latest
                .get(&otp.user_id)
                .and_then(|id| id.as_deref())
                .is_some_and(|id| id == otp.otp_id);
            let state = match otp.state_at(now, self.otp_max_attempts) {
                OtpState::Verified => OtpState::Verified,
                _ if !is_newest => OtpState::Superseded,
                other => other,
            };

            out.push(OtpResponse {
                user_email: emails.get(&otp.user_id).cloned().flatten(),
                otp_id: otp.otp_id,
                user_id: otp.user_id,
                created_at: otp.created_at,
                expires_at: otp.expires_at,
                attempts: otp.attempts,
                is_used: otp.is_used,
                state,
            });
        }
        Ok(out)
    }

    pub async fn list_individual_profiles(
        &self,
        query: &ProfileListQuery,
    ) -> Result<Vec<IndividualProfileResponse>, ServiceError> {
        let profiles = self
            .store
            .search_individual_profiles(&profile_query(query))
            .await?;
        Ok(profiles.into_iter().map(Into::into).collect())
    }

    pub async fn list_organization_profiles(
        &self,
        query: &ProfileListQuery,
    ) -> Result<Vec<OrganizationProfileResponse>, ServiceError> {
        let profiles = self
            .store
            .search_organization_profiles(&profile_query(query))
            .await?;
        Ok(profiles.into_iter().map(Into::into).collect())
    }

    pub async fn list_contact_messages(
        &self,
        page: &Page,
    ) -> Result<Vec<ContactMessageResponse>, ServiceError> {
        let messages = self.store.list_contact_messages(page).await?;
        Ok(messages.into_iter().map(Into::into).collect())
    }

    pub async fn site_setting(&self) -> Result<SiteSettingResponse, ServiceError> {
        let setting = self.store.get_site_setting().await?;
        Ok(SiteSettingResponse::from_setting(
            setting,
            self.contact.fallback_inbox(),
        ))
    }

    pub async fn update_site_setting(
        &self,
        contact_inbox_email: &str,
    ) -> Result<SiteSettingResponse, ServiceError> {
        let setting = SiteSetting::with_inbox(&normalize_email(contact_inbox_email));
        self.store.save_site_setting(&setting).await?;
        tracing::info!(inbox = %setting.contact_inbox_email, "Contact inbox updated");
        Ok(SiteSettingResponse::from_setting(
            Some(setting),
            self.contact.fallback_inbox(),
        ))
    }

    pub async fn bootstrap_roles(&self, reset: bool) -> Result<BootstrapReport, ServiceError> {
        self.roles.bootstrap_roles(reset).await
    }
}

fn profile_query(query: &ProfileListQuery) -> ProfileQuery {
    ProfileQuery {
        search: query.q.clone().filter(|q| !q.trim().is_empty()),
        category: query.category,
        page: Page {
            limit: query.limit,
            offset: query.offset,
        },
    }
}
