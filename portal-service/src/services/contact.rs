use std::sync::Arc;

use super::email::{EmailMessage, EmailProvider};
use super::error::ServiceError;
use super::store::PortalStore;
use crate::config::ContactConfig;
use crate::dtos::contact::ContactForm;
use crate::models::ContactMessage;

const CONTACT_SEQUENCE: &str = "contact_messages";

/// Stores contact-form messages and forwards them to the site inbox.
#[derive(Clone)]
pub struct ContactService {
    store: Arc<dyn PortalStore>,
    email: Arc<dyn EmailProvider>,
    config: ContactConfig,
}

impl ContactService {
    pub fn new(store: Arc<dyn PortalStore>, email: Arc<dyn EmailProvider>, config: ContactConfig) -> Self {
        Self {
            store,
            email,
            config,
        }
    }

    /// Inbox from the site setting, or the configured fallback.
    pub async fn inbox(&self) -> Result<String, ServiceError> {
        Ok(self
            .store
            .get_site_setting()
            .await?
            .map(|s| s.contact_inbox_email)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.config.inbox_email.clone()))
    }

    pub fn fallback_inbox(&self) -> &str {
        &self.config.inbox_email
    }

    /// Store the message, then try to email it. Delivery failure is recorded
    /// on the message and logged; the submission still succeeds.
    pub async fn submit(&self, form: ContactForm) -> Result<ContactMessage, ServiceError> {
        let seq = self.store.next_sequence(CONTACT_SEQUENCE).await?;
        let reference = format!("{}-{:06}", self.config.reference_prefix, seq);
        let mut message = ContactMessage::new(
            reference,
            &form.org_name,
            &form.org_representative,
            &form.phone,
            &form.email,
            &form.message,
        );
        self.store.insert_contact_message(&message).await?;

        let inbox = self.inbox().await?;
        let sent = match EmailMessage::contact_notification(&inbox, &message) {
            Ok(notification) => self.email.send(&notification).await,
            Err(e) => Err(e),
        };
        match sent {
            Ok(()) => {
                message.is_sent = true;
                tracing::info!(reference = %message.reference, "Contact message forwarded");
            }
            Err(e) => {
                message.send_error = e.to_string();
                tracing::warn!(
                    reference = %message.reference,
                    error = %e,
                    "Contact message stored but could not be emailed"
                );
            }
        }
        self.store
            .set_contact_delivery(&message.message_id, message.is_sent, &message.send_error)
            .await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SiteSetting;
    use crate::services::email::MockEmailService;
    use crate::services::store::{MockStore, Page};

    fn config() -> ContactConfig {
        ContactConfig {
            inbox_email: "fallback@example.com".into(),
            reference_prefix: "PORTAL".into(),
        }
    }

    fn form() -> ContactForm {
        ContactForm {
            org_name: "Acme".into(),
            org_representative: "Omar".into(),
            phone: "0500000000".into(),
            email: "omar@acme.example".into(),
            message: "We would like a training session.".into(),
        }
    }

    #[tokio::test]
    async fn delivered_message_uses_site_inbox() {
        let store = Arc::new(MockStore::new());
        let email = Arc::new(MockEmailService::new());
        store
            .save_site_setting(&SiteSetting::with_inbox("team@example.com"))
            .await
            .unwrap();
        let contact = ContactService::new(store.clone(), email.clone(), config());

        let first = contact.submit(form()).await.unwrap();
        let second = contact.submit(form()).await.unwrap();
        assert_eq!(first.reference, "PORTAL-000001");
        assert_eq!(second.reference, "PORTAL-000002");

        let sent = email.sent();
        assert_eq!(sent[0].to, "team@example.com");
        assert_eq!(sent[0].reply_to.as_deref(), Some("omar@acme.example"));

        let stored = store.list_contact_messages(&Page::default()).await.unwrap();
        assert!(stored.iter().all(|m| m.is_sent));
    }

    #[tokio::test]
    async fn delivery_failure_is_recorded_not_raised() {
        let store = Arc::new(MockStore::new());
        let email = Arc::new(MockEmailService::failing("connection refused"));
        let contact = ContactService::new(store.clone(), email, config());

        let message = contact.submit(form()).await.unwrap();
        assert!(!message.is_sent);
        assert!(message.send_error.contains("connection refused"));

        let stored = store.list_contact_messages(&Page::default()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].is_sent);
        assert!(stored[0].send_error.contains("connection refused"));
    }

    #[tokio::test]
    async fn fallback_inbox_without_setting() {
        let contact = ContactService::new(
            Arc::new(MockStore::new()),
            Arc::new(MockEmailService::new()),
            config(),
        );
        assert_eq!(contact.inbox().await.unwrap(), "fallback@example.com");
    }
}
