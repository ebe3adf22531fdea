//! Storage boundary for the portal.
//!
//! Uniqueness is guarded by the store itself (unique indexes in MongoDB, the
//! same checks in `MockStore`); pre-checks in the services only exist to give
//! friendlier messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::error::ServiceError;
use crate::models::{
    ContactMessage, EmailOtp, Group, IndividualProfile, OrganizationCategory, OrganizationProfile,
    Role, SiteSetting, User, UserType,
};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Case-insensitive match over email, full name and phone.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub user_type: Option<UserType>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub page: Page,
}

#[derive(Debug, Clone, Default)]
pub struct OtpQuery {
    pub user_id: Option<String>,
    pub is_used: Option<bool>,
    pub page: Page,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileQuery {
    pub search: Option<String>,
    pub category: Option<OrganizationCategory>,
    pub page: Page,
}

#[async_trait]
pub trait PortalStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    // users
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError>;
    async fn replace_user(&self, user: &User) -> Result<(), ServiceError>;
    async fn delete_user(&self, user_id: &str) -> Result<(), ServiceError>;
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, ServiceError>;
    async fn search_users(&self, query: &UserQuery) -> Result<Vec<User>, ServiceError>;
    async fn set_user_groups(&self, user_id: &str, groups: &[String]) -> Result<(), ServiceError>;
    async fn touch_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), ServiceError>;

    // groups
    async fn find_group(&self, name: &str) -> Result<Option<Group>, ServiceError>;
    async fn find_groups(&self, names: &[String]) -> Result<Vec<Group>, ServiceError>;
    async fn upsert_group(&self, group: &Group) -> Result<(), ServiceError>;

    // activation codes
    async fn insert_otp(&self, otp: &EmailOtp) -> Result<(), ServiceError>;
    /// Most recently created code for the user, used or not. Older codes are
    /// superseded by it.
    async fn find_latest_otp(&self, user_id: &str) -> Result<Option<EmailOtp>, ServiceError>;
    /// Count one submission against a code that is unused, unexpired and
    /// below `max_attempts`, in a single atomic step. Returns the new count,
    /// or `None` when the code no longer takes submissions.
    async fn count_otp_attempt(
        &self,
        otp_id: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>, ServiceError>;
    /// Flip `is_used` if it is still false. Returns whether this call did it.
    async fn mark_otp_used(&self, otp_id: &str) -> Result<bool, ServiceError>;
    async fn search_otps(&self, query: &OtpQuery) -> Result<Vec<EmailOtp>, ServiceError>;

    // profiles
    async fn insert_individual_profile(&self, profile: &IndividualProfile) -> Result<(), ServiceError>;
    async fn find_individual_profile(&self, user_id: &str) -> Result<Option<IndividualProfile>, ServiceError>;
    async fn id_number_taken(&self, id_number: &str) -> Result<bool, ServiceError>;
    async fn search_individual_profiles(&self, query: &ProfileQuery) -> Result<Vec<IndividualProfile>, ServiceError>;
    async fn insert_organization_profile(&self, profile: &OrganizationProfile) -> Result<(), ServiceError>;
    async fn find_organization_profile(&self, user_id: &str) -> Result<Option<OrganizationProfile>, ServiceError>;
    async fn org_name_taken(&self, org_name: &str) -> Result<bool, ServiceError>;
    async fn search_organization_profiles(&self, query: &ProfileQuery) -> Result<Vec<OrganizationProfile>, ServiceError>;

    // contact
    /// Monotonic counter used for human-facing reference numbers.
    async fn next_sequence(&self, name: &str) -> Result<u64, ServiceError>;
    async fn insert_contact_message(&self, message: &ContactMessage) -> Result<(), ServiceError>;
    async fn set_contact_delivery(&self, message_id: &str, is_sent: bool, send_error: &str) -> Result<(), ServiceError>;
    async fn list_contact_messages(&self, page: &Page) -> Result<Vec<ContactMessage>, ServiceError>;
    async fn get_site_setting(&self) -> Result<Option<SiteSetting>, ServiceError>;
    async fn save_site_setting(&self, setting: &SiteSetting) -> Result<(), ServiceError>;
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T>(items: Vec<T>, page: &Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[derive(Default)]
struct MockState {
    users: HashMap<String, User>,
    groups: HashMap<String, Group>,
    otps: Vec<EmailOtp>,
    individuals: Vec<IndividualProfile>,
    organizations: Vec<OrganizationProfile>,
    sequences: HashMap<String, u64>,
    contact_messages: Vec<ContactMessage>,
    site_setting: Option<SiteSetting>,
}

/// In-memory store enforcing the same unique constraints as the MongoDB
/// indexes.
///
/// `yield_on_reads` makes lookups give up the task once after reading and
/// before answering, the way a network round trip would, so concurrent
/// requests act on the same snapshot.
/// `fail_otp_inserts` makes code issuance fail.
#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockState>,
    read_yields: AtomicBool,
    otp_insert_fails: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn yield_on_reads(&self, on: bool) {
        self.read_yields.store(on, Ordering::SeqCst);
    }

    pub fn fail_otp_inserts(&self, on: bool) {
        self.otp_insert_fails.store(on, Ordering::SeqCst);
    }

    async fn round_trip(&self) {
        if self.read_yields.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>, ServiceError> {
        self.state
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock store mutex poisoned: {}", e)))
    }

    fn check_user_unique(state: &MockState, user: &User) -> Result<(), ServiceError> {
        for other in state.users.values() {
            if other.user_id == user.user_id {
                continue;
            }
            if other.email == user.email {
                return Err(ServiceError::conflict("email", "This email is already registered."));
            }
            if user.phone.is_some() && other.phone == user.phone {
                return Err(ServiceError::conflict("phone", "This phone number is already registered."));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PortalStore for MockStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if state.users.contains_key(&user.user_id) {
            return Err(ServiceError::conflict("user_id", "User already exists."));
        }
        Self::check_user_unique(&state, user)?;
        state.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn replace_user(&self, user: &User) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&user.user_id) {
            return Err(ServiceError::NotFound("User"));
        }
        Self::check_user_unique(&state, user)?;
        state.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state.users.remove(user_id);
        state.otps.retain(|o| o.user_id != user_id);
        state.individuals.retain(|p| p.user_id != user_id);
        state.organizations.retain(|p| p.user_id != user_id);
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.lock()?.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let found = self.lock()?.users.values().find(|u| u.email == email).cloned();
        self.round_trip().await;
        Ok(found)
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, ServiceError> {
        let found = self
            .lock()?
            .users
            .values()
            .find(|u| u.phone.as_deref() == Some(phone))
            .cloned();
        self.round_trip().await;
        Ok(found)
    }

    async fn search_users(&self, query: &UserQuery) -> Result<Vec<User>, ServiceError> {
        let state = self.lock()?;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| {
                query.search.as_deref().map_or(true, |q| {
                    contains_ci(&u.email, q)
                        || contains_ci(&u.full_name, q)
                        || u.phone.as_deref().is_some_and(|p| p.contains(q))
                })
            })
            .filter(|u| query.role.map_or(true, |r| u.role == r))
            .filter(|u| query.user_type.map_or(true, |t| u.user_type == t))
            .filter(|u| query.is_active.map_or(true, |a| u.is_active == a))
            .filter(|u| query.is_staff.map_or(true, |s| u.is_staff == s))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.date_joined.cmp(&a.date_joined));
        Ok(paginate(users, &query.page))
    }

    async fn set_user_groups(&self, user_id: &str, groups: &[String]) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        let user = state.users.get_mut(user_id).ok_or(ServiceError::NotFound("User"))?;
        user.groups = groups.to_vec();
        Ok(())
    }

    async fn touch_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if let Some(user) = state.users.get_mut(user_id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn find_group(&self, name: &str) -> Result<Option<Group>, ServiceError> {
        Ok(self.lock()?.groups.get(name).cloned())
    }

    async fn find_groups(&self, names: &[String]) -> Result<Vec<Group>, ServiceError> {
        let state = self.lock()?;
        Ok(names.iter().filter_map(|n| state.groups.get(n).cloned()).collect())
    }

    async fn upsert_group(&self, group: &Group) -> Result<(), ServiceError> {
        self.lock()?.groups.insert(group.name.clone(), group.clone());
        Ok(())
    }

    async fn insert_otp(&self, otp: &EmailOtp) -> Result<(), ServiceError> {
        if self.otp_insert_fails.load(Ordering::SeqCst) {
            return Err(ServiceError::Internal(anyhow::anyhow!("email_otps write failed")));
        }
        self.lock()?.otps.push(otp.clone());
        Ok(())
    }

    async fn find_latest_otp(&self, user_id: &str) -> Result<Option<EmailOtp>, ServiceError> {
        let found = self
            .lock()?
            .otps
            .iter()
            .filter(|o| o.user_id == user_id)
            .max_by_key(|o| o.created_at)
            .cloned();
        self.round_trip().await;
        Ok(found)
    }

    async fn count_otp_attempt(
        &self,
        otp_id: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>, ServiceError> {
        let mut state = self.lock()?;
        Ok(state
            .otps
            .iter_mut()
            .find(|o| {
                o.otp_id == otp_id
                    && !o.is_used
                    && !o.is_expired_at(now)
                    && o.attempts < max_attempts
            })
            .map(|otp| {
                otp.attempts += 1;
                otp.attempts
            }))
    }

    async fn mark_otp_used(&self, otp_id: &str) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        match state.otps.iter_mut().find(|o| o.otp_id == otp_id && !o.is_used) {
            Some(otp) => {
                otp.is_used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn search_otps(&self, query: &OtpQuery) -> Result<Vec<EmailOtp>, ServiceError> {
        let state = self.lock()?;
        let mut otps: Vec<EmailOtp> = state
            .otps
            .iter()
            .filter(|o| query.user_id.as_deref().map_or(true, |id| o.user_id == id))
            .filter(|o| query.is_used.map_or(true, |u| o.is_used == u))
            .cloned()
            .collect();
        otps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(otps, &query.page))
    }

    async fn insert_individual_profile(&self, profile: &IndividualProfile) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if state.individuals.iter().any(|p| p.id_number == profile.id_number) {
            return Err(ServiceError::conflict("id_number", "This ID number is already registered."));
        }
        if state.individuals.iter().any(|p| p.user_id == profile.user_id) {
            return Err(ServiceError::conflict("user_id", "This user already has a profile."));
        }
        state.individuals.push(profile.clone());
        Ok(())
    }

    async fn find_individual_profile(&self, user_id: &str) -> Result<Option<IndividualProfile>, ServiceError> {
        Ok(self
            .lock()?
            .individuals
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn id_number_taken(&self, id_number: &str) -> Result<bool, ServiceError> {
        let taken = self.lock()?.individuals.iter().any(|p| p.id_number == id_number);
        self.round_trip().await;
        Ok(taken)
    }

    async fn search_individual_profiles(&self, query: &ProfileQuery) -> Result<Vec<IndividualProfile>, ServiceError> {
        let state = self.lock()?;
        let mut profiles: Vec<IndividualProfile> = state
            .individuals
            .iter()
            .filter(|p| query.search.as_deref().map_or(true, |q| p.id_number.contains(q)))
            .cloned()
            .collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(profiles, &query.page))
    }

    async fn insert_organization_profile(&self, profile: &OrganizationProfile) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if state.organizations.iter().any(|p| p.org_name == profile.org_name) {
            return Err(ServiceError::conflict("org_name", "This organization name is already registered."));
        }
        if state.organizations.iter().any(|p| p.user_id == profile.user_id) {
            return Err(ServiceError::conflict("user_id", "This user already has a profile."));
        }
        state.organizations.push(profile.clone());
        Ok(())
    }

    async fn find_organization_profile(&self, user_id: &str) -> Result<Option<OrganizationProfile>, ServiceError> {
        Ok(self
            .lock()?
            .organizations
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn org_name_taken(&self, org_name: &str) -> Result<bool, ServiceError> {
        let taken = self.lock()?.organizations.iter().any(|p| p.org_name == org_name);
        self.round_trip().await;
        Ok(taken)
    }

    async fn search_organization_profiles(&self, query: &ProfileQuery) -> Result<Vec<OrganizationProfile>, ServiceError> {
        let state = self.lock()?;
        let mut profiles: Vec<OrganizationProfile> = state
            .organizations
            .iter()
            .filter(|p| {
                query.search.as_deref().map_or(true, |q| {
                    contains_ci(&p.org_name, q)
                        || contains_ci(&p.representative_name, q)
                        || p.representative_phone.contains(q)
                })
            })
            .filter(|p| query.category.map_or(true, |c| p.category == c))
            .cloned()
            .collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(profiles, &query.page))
    }

    async fn next_sequence(&self, name: &str) -> Result<u64, ServiceError> {
        let mut state = self.lock()?;
        let seq = state.sequences.entry(name.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn insert_contact_message(&self, message: &ContactMessage) -> Result<(), ServiceError> {
        self.lock()?.contact_messages.push(message.clone());
        Ok(())
    }

    async fn set_contact_delivery(&self, message_id: &str, is_sent: bool, send_error: &str) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        if let Some(m) = state
            .contact_messages
            .iter_mut()
            .find(|m| m.message_id == message_id)
        {
            m.is_sent = is_sent;
            m.send_error = send_error.to_string();
        }
        Ok(())
    }

    async fn list_contact_messages(&self, page: &Page) -> Result<Vec<ContactMessage>, ServiceError> {
        let state = self.lock()?;
        let mut messages = state.contact_messages.clone();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(messages, page))
    }

    async fn get_site_setting(&self) -> Result<Option<SiteSetting>, ServiceError> {
        Ok(self.lock()?.site_setting.clone())
    }

    async fn save_site_setting(&self, setting: &SiteSetting) -> Result<(), ServiceError> {
        self.lock()?.site_setting = Some(setting.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(email: &str, phone: Option<&str>) -> User {
        User::new(
            email.to_string(),
            "Test".to_string(),
            phone.map(str::to_string),
            Role::Ind,
            None,
        )
    }

    #[tokio::test]
    async fn mock_store_enforces_unique_email_and_phone() {
        let store = MockStore::new();
        store.insert_user(&user("a@example.com", Some("0500000001"))).await.unwrap();

        let dup_email = store.insert_user(&user("a@example.com", None)).await;
        assert!(matches!(dup_email, Err(ServiceError::Conflict { field: "email", .. })));

        let dup_phone = store
            .insert_user(&user("b@example.com", Some("0500000001")))
            .await;
        assert!(matches!(dup_phone, Err(ServiceError::Conflict { field: "phone", .. })));

        // two users without a phone do not collide
        store.insert_user(&user("c@example.com", None)).await.unwrap();
        store.insert_user(&user("d@example.com", None)).await.unwrap();
    }

    #[tokio::test]
    async fn newest_otp_supersedes_older_ones() {
        let store = MockStore::new();
        let now = Utc::now();
        let (older, _) = EmailOtp::issue("u1", Duration::minutes(10), now - Duration::minutes(2));
        let (newer, _) = EmailOtp::issue("u1", Duration::minutes(10), now);
        store.insert_otp(&older).await.unwrap();
        store.insert_otp(&newer).await.unwrap();

        let found = store.find_latest_otp("u1").await.unwrap().unwrap();
        assert_eq!(found.otp_id, newer.otp_id);

        assert!(store.mark_otp_used(&newer.otp_id).await.unwrap());
        assert!(!store.mark_otp_used(&newer.otp_id).await.unwrap());

        // a used newest code does not revive the older one
        let found = store.find_latest_otp("u1").await.unwrap().unwrap();
        assert_eq!(found.otp_id, newer.otp_id);
        assert!(found.is_used);
    }

    #[tokio::test]
    async fn attempts_are_counted_up_to_the_cap() {
        let store = MockStore::new();
        let now = Utc::now();
        let (otp, _) = EmailOtp::issue("u1", Duration::minutes(10), now);
        store.insert_otp(&otp).await.unwrap();

        for expected in 1..=5 {
            assert_eq!(
                store.count_otp_attempt(&otp.otp_id, 5, now).await.unwrap(),
                Some(expected)
            );
        }
        assert_eq!(store.count_otp_attempt(&otp.otp_id, 5, now).await.unwrap(), None);
        let stored = store.find_latest_otp("u1").await.unwrap().unwrap();
        assert_eq!(stored.attempts, 5);

        let (expired, _) = EmailOtp::issue("u2", Duration::minutes(10), now - Duration::minutes(20));
        store.insert_otp(&expired).await.unwrap();
        assert_eq!(store.count_otp_attempt(&expired.otp_id, 5, now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sequences_increase() {
        let store = MockStore::new();
        assert_eq!(store.next_sequence("contact").await.unwrap(), 1);
        assert_eq!(store.next_sequence("contact").await.unwrap(), 2);
        assert_eq!(store.next_sequence("other").await.unwrap(), 1);
    }
}
