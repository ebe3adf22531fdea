//! Signup, activation, login and the user writes they depend on.
//!
//! Methods take the request's `SessionData` by mutable reference; callers
//! persist it afterwards, including on error, since some failures clear the
//! pending activation.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use validator::ValidationErrors;

use super::error::ServiceError;
use super::metrics;
use super::otp::OtpService;
use super::roles::RoleService;
use super::store::PortalStore;
use crate::dtos::accounts::{IndividualSignupForm, OrganizationSignupForm};
use crate::models::user::normalize_email;
use crate::models::{
    IndividualProfile, OrganizationCategory, OrganizationLocation, OrganizationProfile,
    Permission, Role, SessionData, User,
};
use crate::utils::validation::invalid;
use crate::utils::{
    hash_password, password_policy_errors, verify_against_dummy, verify_password, Password,
    PasswordHashString,
};

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn PortalStore>,
    roles: RoleService,
    otp: OtpService,
}

#[derive(Debug)]
pub struct SignupOutcome {
    pub user: User,
    pub email_sent: bool,
}

#[derive(Debug)]
pub struct ResendOutcome {
    pub email_sent: bool,
    pub retry_after_seconds: i64,
}

/// Fields shared by both signup forms.
struct AccountFields<'a> {
    email: &'a str,
    full_name: &'a str,
    phone: Option<&'a str>,
    password1: &'a str,
    password2: &'a str,
    requested_role: Option<&'a str>,
}

/// True for exactly ten ASCII digits, the shape of a phone login.
fn is_phone_identifier(identifier: &str) -> bool {
    identifier.len() == 10 && identifier.bytes().all(|b| b.is_ascii_digit())
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl AccountService {
    pub fn new(store: Arc<dyn PortalStore>, roles: RoleService, otp: OtpService) -> Self {
        Self { store, roles, otp }
    }

    pub fn otp(&self) -> &OtpService {
        &self.otp
    }

    /// Insert a new user, then bring its role groups in line.
    pub async fn create_user(&self, user: &mut User) -> Result<(), ServiceError> {
        user.normalize();
        self.store.insert_user(user).await?;
        self.roles.on_user_saved(user).await;
        Ok(())
    }

    /// Persist changes to an existing user, then bring its role groups in line.
    pub async fn save_user(&self, user: &mut User) -> Result<(), ServiceError> {
        user.normalize();
        self.store.replace_user(user).await?;
        self.roles.on_user_saved(user).await;
        Ok(())
    }

    async fn check_account_fields(
        &self,
        fields: &AccountFields<'_>,
        signup_role: Role,
        errors: &mut ValidationErrors,
    ) -> Result<(), ServiceError> {
        if let Some(requested) = blank_to_none(fields.requested_role) {
            match requested.parse::<Role>() {
                Ok(role) if role == signup_role => {}
                Ok(role) if role.is_restricted_for_self_signup() => errors.add(
                    "role",
                    invalid("restricted_role", "This role cannot be chosen at signup."),
                ),
                _ => errors.add(
                    "role",
                    invalid("invalid_role", "This role is not available on this form."),
                ),
            }
        }

        if fields.password1 != fields.password2 {
            errors.add(
                "password2",
                invalid("password_mismatch", "The two password fields didn't match."),
            );
        } else {
            for err in password_policy_errors(fields.password1, &[fields.email, fields.full_name]) {
                errors.add("password2", err);
            }
        }

        let email = normalize_email(fields.email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            errors.add(
                "email",
                invalid("unique", "A user with this email already exists."),
            );
        }
        if let Some(phone) = blank_to_none(fields.phone) {
            if self.store.find_user_by_phone(phone).await?.is_some() {
                errors.add(
                    "phone",
                    invalid("unique", "A user with this phone number already exists."),
                );
            }
        }
        Ok(())
    }

    fn new_account(fields: &AccountFields<'_>, role: Role) -> Result<User, ServiceError> {
        let password_hash = hash_password(&Password::new(fields.password1.to_string()))
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?;
        Ok(User::new(
            fields.email.to_string(),
            fields.full_name.to_string(),
            blank_to_none(fields.phone).map(str::to_string),
            role,
            Some(password_hash.into_string()),
        ))
    }

    /// Remember the pending account in the session, then issue the first
    /// code. The account already exists, so a failed issuance is reported as
    /// an unsent email and the user can ask for a new code.
    async fn start_activation(
        &self,
        user: User,
        session: &mut SessionData,
    ) -> Result<SignupOutcome, ServiceError> {
        session.pending_activation_user_id = Some(user.user_id.clone());
        session.otp_resend_last = Some(Utc::now());

        let email_sent = match self.otp.issue_and_send(&user).await {
            Ok(issued) => issued.delivered,
            Err(e) => {
                tracing::error!(user_id = %user.user_id, error = %e, "Activation code could not be issued");
                false
            }
        };
        Ok(SignupOutcome { user, email_sent })
    }

    /// Remove a user whose profile could not be written.
    async fn discard_user(&self, user: &User) {
        if let Err(e) = self.store.delete_user(&user.user_id).await {
            tracing::error!(user_id = %user.user_id, error = %e, "Failed to remove user after profile write failed");
        }
    }

    pub async fn register_individual(
        &self,
        form: IndividualSignupForm,
        session: &mut SessionData,
    ) -> Result<SignupOutcome, ServiceError> {
        let fields = AccountFields {
            email: &form.email,
            full_name: &form.full_name,
            phone: form.phone.as_deref(),
            password1: &form.password1,
            password2: &form.password2,
            requested_role: form.role.as_deref(),
        };

        let mut errors = ValidationErrors::new();
        self.check_account_fields(&fields, Role::Ind, &mut errors).await?;
        let id_number = form.id_number.trim();
        if self.store.id_number_taken(id_number).await? {
            errors.add(
                "id_number",
                invalid("unique", "This ID number is already registered."),
            );
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let mut user = Self::new_account(&fields, Role::Ind)?;
        self.create_user(&mut user).await?;

        let profile = IndividualProfile::new(&user.user_id, id_number);
        if let Err(e) = self.store.insert_individual_profile(&profile).await {
            self.discard_user(&user).await;
            return Err(e);
        }

        tracing::info!(user_id = %user.user_id, role = %user.role, "Individual signed up");
        self.start_activation(user, session).await
    }

    pub async fn register_organization(
        &self,
        form: OrganizationSignupForm,
        session: &mut SessionData,
    ) -> Result<SignupOutcome, ServiceError> {
        let fields = AccountFields {
            email: &form.email,
            full_name: &form.full_name,
            phone: form.phone.as_deref(),
            password1: &form.password1,
            password2: &form.password2,
            requested_role: form.role.as_deref(),
        };

        let mut errors = ValidationErrors::new();
        self.check_account_fields(&fields, Role::Org, &mut errors).await?;

        let category = form.category.parse::<OrganizationCategory>().ok();
        if category.is_none() {
            errors.add(
                "category",
                invalid("category", "Choose a valid organization category."),
            );
        }

        let org_name = form.org_name.trim();
        if self.store.org_name_taken(org_name).await? {
            errors.add(
                "org_name",
                invalid("unique", "An organization with this name is already registered."),
            );
        }

        let latitude = parse_coordinate(form.latitude.as_deref(), -90.0, 90.0);
        let longitude = parse_coordinate(form.longitude.as_deref(), -180.0, 180.0);
        if latitude.is_err() {
            errors.add(
                "latitude",
                invalid("latitude", "Latitude must be a number between -90 and 90."),
            );
        }
        if longitude.is_err() {
            errors.add(
                "longitude",
                invalid("longitude", "Longitude must be a number between -180 and 180."),
            );
        }
        let location = OrganizationLocation {
            map_url: form.map_url.clone().unwrap_or_default(),
            location_description: form.location_description.clone().unwrap_or_default(),
            latitude: latitude.unwrap_or(None),
            longitude: longitude.unwrap_or(None),
        };
        if latitude.is_ok() && longitude.is_ok() {
            location.collect_errors(&mut errors);
        }

        let category = match category {
            Some(category) if errors.is_empty() => category,
            _ => return Err(ServiceError::Validation(errors)),
        };

        let mut user = Self::new_account(&fields, Role::Org)?;
        self.create_user(&mut user).await?;

        let profile = OrganizationProfile::new(
            &user.user_id,
            category,
            org_name,
            &form.representative_name,
            &form.representative_phone,
            location,
        );
        if let Err(e) = self.store.insert_organization_profile(&profile).await {
            self.discard_user(&user).await;
            return Err(e);
        }

        tracing::info!(user_id = %user.user_id, category = category.as_str(), "Organization signed up");
        self.start_activation(user, session).await
    }

    async fn pending_user(&self, session: &mut SessionData) -> Result<User, ServiceError> {
        let user_id = session
            .pending_activation_user_id
            .clone()
            .ok_or(ServiceError::NoPendingActivation)?;
        match self.store.find_user_by_id(&user_id).await? {
            Some(user) => Ok(user),
            None => {
                session.clear_pending();
                Err(ServiceError::PendingAccountMissing)
            }
        }
    }

    /// Check the submitted code for the session's pending account. On
    /// success the account is activated and the session signed in.
    pub async fn verify_activation(
        &self,
        code: &str,
        session: &mut SessionData,
    ) -> Result<User, ServiceError> {
        let mut user = self.pending_user(session).await?;
        self.otp.verify(&user.user_id, code.trim()).await?;

        user.is_active = true;
        self.save_user(&mut user).await?;

        let now = Utc::now();
        self.store.touch_last_login(&user.user_id, now).await?;
        user.last_login = Some(now);

        session.clear_pending();
        session.user_id = Some(user.user_id.clone());
        tracing::info!(user_id = %user.user_id, "Account activated");
        Ok(user)
    }

    /// Issue a fresh code for the pending account, at most once per cooldown.
    pub async fn resend_activation(
        &self,
        session: &mut SessionData,
    ) -> Result<ResendOutcome, ServiceError> {
        let user = self.pending_user(session).await?;
        if user.is_active {
            session.clear_pending();
            return Err(ServiceError::NoPendingActivation);
        }

        let cooldown = self.otp.config().resend_cooldown_seconds;
        let now = Utc::now();
        if let Some(wait) = session.resend_wait(now, cooldown) {
            return Err(ServiceError::ResendCooldown {
                retry_after: wait.max(1) as u64,
            });
        }

        let issued = self.otp.issue_and_send(&user).await?;
        session.otp_resend_last = Some(now);
        Ok(ResendOutcome {
            email_sent: issued.delivered,
            retry_after_seconds: cooldown,
        })
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, ServiceError> {
        let identifier = identifier.trim();
        if is_phone_identifier(identifier) {
            self.store.find_user_by_phone(identifier).await
        } else {
            self.store.find_user_by_email(&normalize_email(identifier)).await
        }
    }

    /// Resolve an email or 10-digit phone plus password to an active user and
    /// sign the session in. An inactive account with the right password gets
    /// its own error; anything else is plain invalid credentials.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        session: &mut SessionData,
    ) -> Result<User, ServiceError> {
        let user = self.find_by_identifier(identifier).await?;

        let password = Password::new(password.to_string());
        let verified = match user.as_ref().and_then(|u| u.password_hash.clone()) {
            Some(hash) => verify_password(&password, &PasswordHashString::new(hash)).is_ok(),
            None => {
                verify_against_dummy(&password);
                false
            }
        };

        let Some(mut user) = user.filter(|_| verified) else {
            metrics::record_login("invalid_credentials");
            tracing::info!("Login rejected: invalid credentials");
            return Err(ServiceError::InvalidCredentials);
        };

        if !user.is_active {
            metrics::record_login("inactive");
            tracing::info!(user_id = %user.user_id, "Login rejected: account inactive");
            return Err(ServiceError::AccountInactive);
        }

        let now = Utc::now();
        self.store.touch_last_login(&user.user_id, now).await?;
        user.last_login = Some(now);

        session.clear_pending();
        session.user_id = Some(user.user_id.clone());
        metrics::record_login("success");
        tracing::info!(user_id = %user.user_id, role = %user.role, "User logged in");
        Ok(user)
    }

    /// The signed-in, still active user for this session.
    pub async fn current_user(&self, session: &SessionData) -> Result<User, ServiceError> {
        let user_id = session
            .user_id
            .as_deref()
            .ok_or(ServiceError::NotAuthenticated)?;
        self.store
            .find_user_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(ServiceError::NotAuthenticated)
    }

    pub async fn effective_permissions(
        &self,
        user: &User,
    ) -> Result<BTreeSet<Permission>, ServiceError> {
        self.roles.effective_permissions(user).await
    }
}

/// Blank means not given; anything else must be a number inside the range.
fn parse_coordinate(value: Option<&str>, min: f64, max: f64) -> Result<Option<f64>, ()> {
    match blank_to_none(value) {
        None => Ok(None),
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && (min..=max).contains(&v) => Ok(Some(v)),
            _ => Err(()),
        },
    }
}
