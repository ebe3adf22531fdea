use askama::Template;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use service_core::error::AppError;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::models::{ContactMessage, User};

/// Outbound transactional email with a plain-text and an HTML part.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub reply_to: Option<String>,
}

#[derive(Template)]
#[template(path = "emails/activation_code.txt")]
struct ActivationCodeText<'a> {
    name: &'a str,
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "emails/activation_code.html")]
struct ActivationCodeHtml<'a> {
    name: &'a str,
    code: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "emails/contact_notification.txt")]
struct ContactNotificationText<'a> {
    reference: &'a str,
    org_name: &'a str,
    representative: &'a str,
    phone: &'a str,
    email: &'a str,
    received: &'a str,
    body: &'a str,
}

#[derive(Template)]
#[template(path = "emails/contact_notification.html")]
struct ContactNotificationHtml<'a> {
    reference: &'a str,
    org_name: &'a str,
    representative: &'a str,
    phone: &'a str,
    email: &'a str,
    received: &'a str,
    body: &'a str,
}

fn render(template: &impl Template) -> Result<String, AppError> {
    template
        .render()
        .map_err(|e| AppError::EmailError(format!("Failed to render email: {}", e)))
}

impl EmailMessage {
    pub fn activation_code(user: &User, code: &str, ttl_minutes: i64) -> Result<Self, AppError> {
        let name = user.display_name();
        Ok(Self {
            to: user.email.clone(),
            subject: "Your account activation code".to_string(),
            body_text: render(&ActivationCodeText {
                name,
                code,
                ttl_minutes,
            })?,
            body_html: render(&ActivationCodeHtml {
                name,
                code,
                ttl_minutes,
            })?,
            reply_to: None,
        })
    }

    pub fn contact_notification(inbox: &str, message: &ContactMessage) -> Result<Self, AppError> {
        let received = message.created_at.format("%Y-%m-%d %H:%M UTC").to_string();
        let text = ContactNotificationText {
            reference: &message.reference,
            org_name: &message.org_name,
            representative: &message.org_representative,
            phone: &message.phone,
            email: &message.email,
            received: &received,
            body: &message.message,
        };
        let html = ContactNotificationHtml {
            reference: text.reference,
            org_name: text.org_name,
            representative: text.representative,
            phone: text.phone,
            email: text.email,
            received: text.received,
            body: text.body,
        };
        Ok(Self {
            to: inbox.to_string(),
            subject: format!("New contact message | {}", message.org_name),
            body_text: render(&text)?,
            body_html: render(&html)?,
            reply_to: Some(message.email.clone()),
        })
    }
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

pub struct SmtpEmailService {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpEmailService {
    pub fn new(config: SmtpConfig) -> Result<Self, AppError> {
        if !config.enabled {
            tracing::warn!("SMTP delivery is disabled; outbound email will fail");
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let relay = if config.implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        };
        let builder = relay.map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Failed to create SMTP relay: {}", e))
        })?;

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)));
        if !config.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ));
        }

        tracing::info!(host = %config.host, port = config.port, "Email service initialized");

        Ok(Self {
            config,
            transport: Some(builder.build()),
        })
    }

    fn build_message(&self, email: &EmailMessage) -> Result<Message, AppError> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid from address: {}", e)))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::EmailError(format!("Invalid recipient: {}", e)))?;

        let mut builder = Message::builder().from(from).to(to).subject(&email.subject);
        if let Some(reply_to) = &email.reply_to {
            let reply: Mailbox = reply_to
                .parse()
                .map_err(|e| AppError::EmailError(format!("Invalid reply-to address: {}", e)))?;
            builder = builder.reply_to(reply);
        }

        Ok(builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(email.body_text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(email.body_html.clone()),
                ),
        )?)
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| AppError::EmailError("SMTP delivery is not enabled".to_string()))?;

        let message = self.build_message(email)?;
        match transport.send(message).await {
            Ok(_) => {
                tracing::info!(subject = %email.subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, subject = %email.subject, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let Some(transport) = self.transport.as_ref() else {
            return Ok(());
        };
        match transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::EmailError("SMTP server refused the connection".to_string())),
            Err(e) => Err(AppError::EmailError(format!("SMTP connection test failed: {}", e))),
        }
    }
}

/// Records every message instead of sending it. `fail_with` makes every
/// send fail with the given error text.
#[derive(Default)]
pub struct MockEmailService {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail_with: Mutex<Option<String>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Mutex::new(Some(reason.to_string())),
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn set_failure(&self, reason: Option<&str>) {
        if let Ok(mut f) = self.fail_with.lock() {
            *f = reason.map(str::to_string);
        }
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send(&self, email: &EmailMessage) -> Result<(), AppError> {
        let failure = self
            .fail_with
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock email mutex poisoned: {}", e)))?
            .clone();
        if let Some(reason) = failure {
            return Err(AppError::EmailError(reason));
        }
        self.sent
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock email mutex poisoned: {}", e)))?
            .push(email.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
