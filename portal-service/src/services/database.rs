use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    options::{FindOneAndUpdateOptions, FindOneOptions, FindOptions, IndexOptions, ReplaceOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

use super::error::{is_duplicate_key, ServiceError};
use super::store::{OtpQuery, Page, PortalStore, ProfileQuery, UserQuery};
use crate::models::{
    contact::SITE_SETTING_ID, ContactMessage, EmailOtp, Group, IndividualProfile,
    OrganizationProfile, SiteSetting, User,
};

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for portal-service");

        self.create_index(
            &self.users(),
            doc! { "email": 1 },
            IndexOptions::builder()
                .name("email_unique".to_string())
                .unique(true)
                .build(),
        )
        .await?;

        // users without a phone omit the field, so only set phones collide
        self.create_index(
            &self.users(),
            doc! { "phone": 1 },
            IndexOptions::builder()
                .name("phone_unique".to_string())
                .unique(true)
                .partial_filter_expression(doc! { "phone": { "$type": "string" } })
                .build(),
        )
        .await?;

        self.create_index(
            &self.users(),
            doc! { "role": 1, "is_active": 1 },
            IndexOptions::builder().name("role_active".to_string()).build(),
        )
        .await?;

        self.create_index(
            &self.email_otps(),
            doc! { "user_id": 1, "created_at": -1 },
            IndexOptions::builder().name("user_latest".to_string()).build(),
        )
        .await?;

        self.create_index(
            &self.email_otps(),
            doc! { "expires_at": 1 },
            IndexOptions::builder().name("expires_at".to_string()).build(),
        )
        .await?;

        self.create_index(
            &self.individual_profiles(),
            doc! { "id_number": 1 },
            IndexOptions::builder()
                .name("id_number_unique".to_string())
                .unique(true)
                .build(),
        )
        .await?;

        self.create_index(
            &self.individual_profiles(),
            doc! { "user_id": 1 },
            IndexOptions::builder()
                .name("user_unique".to_string())
                .unique(true)
                .build(),
        )
        .await?;

        self.create_index(
            &self.organization_profiles(),
            doc! { "org_name": 1 },
            IndexOptions::builder()
                .name("org_name_unique".to_string())
                .unique(true)
                .build(),
        )
        .await?;

        self.create_index(
            &self.organization_profiles(),
            doc! { "user_id": 1 },
            IndexOptions::builder()
                .name("user_unique".to_string())
                .unique(true)
                .build(),
        )
        .await?;

        self.create_index(
            &self.organization_profiles(),
            doc! { "category": 1 },
            IndexOptions::builder().name("category".to_string()).build(),
        )
        .await?;

        self.create_index(
            &self.contact_messages(),
            doc! { "created_at": -1 },
            IndexOptions::builder().name("created_at".to_string()).build(),
        )
        .await?;

        Ok(())
    }

    async fn create_index<T: Send + Sync>(
        &self,
        collection: &Collection<T>,
        keys: Document,
        options: IndexOptions,
    ) -> Result<(), AppError> {
        let index = IndexModel::builder().keys(keys.clone()).options(options).build();
        collection.create_index(index, None).await.map_err(|e| {
            tracing::error!(
                collection = %collection.name(),
                "Failed to create index: {}",
                e
            );
            AppError::from(e)
        })?;
        tracing::info!(collection = %collection.name(), keys = %keys, "Created index");
        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn groups(&self) -> Collection<Group> {
        self.db.collection("groups")
    }

    pub fn email_otps(&self) -> Collection<EmailOtp> {
        self.db.collection("email_otps")
    }

    pub fn individual_profiles(&self) -> Collection<IndividualProfile> {
        self.db.collection("individual_profiles")
    }

    pub fn organization_profiles(&self) -> Collection<OrganizationProfile> {
        self.db.collection("organization_profiles")
    }

    pub fn contact_messages(&self) -> Collection<ContactMessage> {
        self.db.collection("contact_messages")
    }

    pub fn site_settings(&self) -> Collection<SiteSetting> {
        self.db.collection("site_settings")
    }

    fn counters(&self) -> Collection<Document> {
        self.db.collection("counters")
    }
}

/// Map duplicate-key failures to a field conflict, everything else to a
/// database error.
fn write_error(err: mongodb::error::Error, field: &'static str, message: &str) -> ServiceError {
    if is_duplicate_key(&err) {
        ServiceError::conflict(field, message)
    } else {
        ServiceError::Database(err)
    }
}

/// Duplicate key on the users collection: the index name in the server
/// message tells which field collided.
fn user_write_error(err: mongodb::error::Error) -> ServiceError {
    if !is_duplicate_key(&err) {
        return ServiceError::Database(err);
    }
    if err.to_string().contains("phone_unique") {
        ServiceError::conflict("phone", "This phone number is already registered.")
    } else {
        ServiceError::conflict("email", "This email is already registered.")
    }
}

/// Case-insensitive substring pattern matching `text` literally.
fn ci_pattern(text: &str) -> Bson {
    Bson::Document(doc! { "$regex": regex::escape(text), "$options": "i" })
}

fn find_options(page: &Page, sort: Document) -> FindOptions {
    FindOptions::builder()
        .sort(sort)
        .limit(page.limit())
        .skip(page.offset())
        .build()
}

#[async_trait]
impl PortalStore for MongoDb {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        self.users()
            .insert_one(user, None)
            .await
            .map_err(user_write_error)?;
        Ok(())
    }

    async fn replace_user(&self, user: &User) -> Result<(), ServiceError> {
        let result = self
            .users()
            .replace_one(doc! { "_id": &user.user_id }, user, ReplaceOptions::default())
            .await
            .map_err(user_write_error)?;
        if result.matched_count == 0 {
            return Err(ServiceError::NotFound("User"));
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), ServiceError> {
        self.email_otps()
            .delete_many(doc! { "user_id": user_id }, None)
            .await?;
        self.individual_profiles()
            .delete_many(doc! { "user_id": user_id }, None)
            .await?;
        self.organization_profiles()
            .delete_many(doc! { "user_id": user_id }, None)
            .await?;
        self.users().delete_one(doc! { "_id": user_id }, None).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users().find_one(doc! { "_id": user_id }, None).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users().find_one(doc! { "phone": phone }, None).await?)
    }

    async fn search_users(&self, query: &UserQuery) -> Result<Vec<User>, ServiceError> {
        let mut filter = Document::new();
        if let Some(q) = query.search.as_deref().filter(|q| !q.trim().is_empty()) {
            let pattern = ci_pattern(q.trim());
            filter.insert(
                "$or",
                vec![
                    doc! { "email": pattern.clone() },
                    doc! { "full_name": pattern.clone() },
                    doc! { "phone": pattern },
                ],
            );
        }
        if let Some(role) = query.role {
            filter.insert("role", role.as_str());
        }
        if let Some(user_type) = query.user_type {
            filter.insert("user_type", user_type.as_str());
        }
        if let Some(active) = query.is_active {
            filter.insert("is_active", active);
        }
        if let Some(staff) = query.is_staff {
            filter.insert("is_staff", staff);
        }

        let cursor = self
            .users()
            .find(filter, find_options(&query.page, doc! { "date_joined": -1 }))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_user_groups(&self, user_id: &str, groups: &[String]) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "groups": groups.to_vec() } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn touch_last_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$set": { "last_login": mongodb::bson::DateTime::from_chrono(at) } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn find_group(&self, name: &str) -> Result<Option<Group>, ServiceError> {
        Ok(self.groups().find_one(doc! { "_id": name }, None).await?)
    }

    async fn find_groups(&self, names: &[String]) -> Result<Vec<Group>, ServiceError> {
        let cursor = self
            .groups()
            .find(doc! { "_id": { "$in": names.to_vec() } }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn upsert_group(&self, group: &Group) -> Result<(), ServiceError> {
        self.groups()
            .replace_one(
                doc! { "_id": &group.name },
                group,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn insert_otp(&self, otp: &EmailOtp) -> Result<(), ServiceError> {
        self.email_otps().insert_one(otp, None).await?;
        Ok(())
    }

    async fn find_latest_otp(&self, user_id: &str) -> Result<Option<EmailOtp>, ServiceError> {
        let options = FindOneOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        Ok(self
            .email_otps()
            .find_one(doc! { "user_id": user_id }, options)
            .await?)
    }

    async fn count_otp_attempt(
        &self,
        otp_id: &str,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>, ServiceError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .email_otps()
            .find_one_and_update(
                doc! {
                    "_id": otp_id,
                    "is_used": false,
                    "expires_at": { "$gt": mongodb::bson::DateTime::from_chrono(now) },
                    "attempts": { "$lt": max_attempts as i64 },
                },
                doc! { "$inc": { "attempts": 1_i64 } },
                options,
            )
            .await?;
        Ok(updated.map(|otp| otp.attempts))
    }

    async fn mark_otp_used(&self, otp_id: &str) -> Result<bool, ServiceError> {
        let result = self
            .email_otps()
            .update_one(
                doc! { "_id": otp_id, "is_used": false },
                doc! { "$set": { "is_used": true } },
                None,
            )
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn search_otps(&self, query: &OtpQuery) -> Result<Vec<EmailOtp>, ServiceError> {
        let mut filter = Document::new();
        if let Some(user_id) = &query.user_id {
            filter.insert("user_id", user_id.as_str());
        }
        if let Some(used) = query.is_used {
            filter.insert("is_used", used);
        }
        let cursor = self
            .email_otps()
            .find(filter, find_options(&query.page, doc! { "created_at": -1 }))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_individual_profile(&self, profile: &IndividualProfile) -> Result<(), ServiceError> {
        self.individual_profiles()
            .insert_one(profile, None)
            .await
            .map_err(|e| write_error(e, "id_number", "This ID number is already registered."))?;
        Ok(())
    }

    async fn find_individual_profile(&self, user_id: &str) -> Result<Option<IndividualProfile>, ServiceError> {
        Ok(self
            .individual_profiles()
            .find_one(doc! { "user_id": user_id }, None)
            .await?)
    }

    async fn id_number_taken(&self, id_number: &str) -> Result<bool, ServiceError> {
        let count = self
            .individual_profiles()
            .count_documents(doc! { "id_number": id_number }, None)
            .await?;
        Ok(count > 0)
    }

    async fn search_individual_profiles(&self, query: &ProfileQuery) -> Result<Vec<IndividualProfile>, ServiceError> {
        let mut filter = Document::new();
        if let Some(q) = query.search.as_deref().filter(|q| !q.trim().is_empty()) {
            filter.insert("id_number", ci_pattern(q.trim()));
        }
        let cursor = self
            .individual_profiles()
            .find(filter, find_options(&query.page, doc! { "created_at": -1 }))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_organization_profile(&self, profile: &OrganizationProfile) -> Result<(), ServiceError> {
        self.organization_profiles()
            .insert_one(profile, None)
            .await
            .map_err(|e| write_error(e, "org_name", "This organization name is already registered."))?;
        Ok(())
    }

    async fn find_organization_profile(&self, user_id: &str) -> Result<Option<OrganizationProfile>, ServiceError> {
        Ok(self
            .organization_profiles()
            .find_one(doc! { "user_id": user_id }, None)
            .await?)
    }

    async fn org_name_taken(&self, org_name: &str) -> Result<bool, ServiceError> {
        let count = self
            .organization_profiles()
            .count_documents(doc! { "org_name": org_name }, None)
            .await?;
        Ok(count > 0)
    }

    async fn search_organization_profiles(&self, query: &ProfileQuery) -> Result<Vec<OrganizationProfile>, ServiceError> {
        let mut filter = Document::new();
        if let Some(q) = query.search.as_deref().filter(|q| !q.trim().is_empty()) {
            let pattern = ci_pattern(q.trim());
            filter.insert(
                "$or",
                vec![
                    doc! { "org_name": pattern.clone() },
                    doc! { "representative_name": pattern.clone() },
                    doc! { "representative_phone": pattern },
                ],
            );
        }
        if let Some(category) = query.category {
            filter.insert("category", category.as_str());
        }
        let cursor = self
            .organization_profiles()
            .find(filter, find_options(&query.page, doc! { "created_at": -1 }))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn next_sequence(&self, name: &str) -> Result<u64, ServiceError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = self
            .counters()
            .find_one_and_update(doc! { "_id": name }, doc! { "$inc": { "seq": 1_i64 } }, options)
            .await?
            .ok_or_else(|| ServiceError::Internal(anyhow::anyhow!("Counter upsert returned nothing")))?;
        let seq = counter
            .get_i64("seq")
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Malformed counter: {}", e)))?;
        Ok(seq.max(0) as u64)
    }

    async fn insert_contact_message(&self, message: &ContactMessage) -> Result<(), ServiceError> {
        self.contact_messages().insert_one(message, None).await?;
        Ok(())
    }

    async fn set_contact_delivery(&self, message_id: &str, is_sent: bool, send_error: &str) -> Result<(), ServiceError> {
        self.contact_messages()
            .update_one(
                doc! { "_id": message_id },
                doc! { "$set": { "is_sent": is_sent, "send_error": send_error } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn list_contact_messages(&self, page: &Page) -> Result<Vec<ContactMessage>, ServiceError> {
        let cursor = self
            .contact_messages()
            .find(doc! {}, find_options(page, doc! { "created_at": -1 }))
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn get_site_setting(&self) -> Result<Option<SiteSetting>, ServiceError> {
        Ok(self
            .site_settings()
            .find_one(doc! { "_id": SITE_SETTING_ID }, None)
            .await?)
    }

    async fn save_site_setting(&self, setting: &SiteSetting) -> Result<(), ServiceError> {
        self.site_settings()
            .replace_one(
                doc! { "_id": SITE_SETTING_ID },
                setting,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }
}
