use chrono::{Duration, Utc};
use std::sync::Arc;

use super::email::{EmailMessage, EmailProvider};
use super::error::ServiceError;
use super::metrics;
use super::store::PortalStore;
use crate::config::OtpConfig;
use crate::models::{EmailOtp, OtpCheck, User};

/// Issues activation codes and checks submissions against the newest one.
#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn PortalStore>,
    email: Arc<dyn EmailProvider>,
    config: OtpConfig,
}

/// Result of issuing a code. Delivery failure is not an error: the code
/// exists and the user can ask for another one.
#[derive(Debug, Clone, PartialEq)]
pub struct Issued {
    pub otp_id: String,
    pub delivered: bool,
}

impl OtpService {
    pub fn new(store: Arc<dyn PortalStore>, email: Arc<dyn EmailProvider>, config: OtpConfig) -> Self {
        Self {
            store,
            email,
            config,
        }
    }

    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// Store a fresh code for the user and email it.
    pub async fn issue_and_send(&self, user: &User) -> Result<Issued, ServiceError> {
        let (otp, code) = EmailOtp::issue(
            &user.user_id,
            Duration::minutes(self.config.ttl_minutes),
            Utc::now(),
        );
        self.store.insert_otp(&otp).await?;
        metrics::record_otp_issued();

        let sent = match EmailMessage::activation_code(user, &code, self.config.ttl_minutes) {
            Ok(message) => self.email.send(&message).await,
            Err(e) => Err(e),
        };
        let delivered = match sent {
            Ok(()) => {
                tracing::info!(user_id = %user.user_id, otp_id = %otp.otp_id, "Activation code sent");
                true
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user.user_id,
                    otp_id = %otp.otp_id,
                    error = %e,
                    "Activation code could not be delivered"
                );
                false
            }
        };

        Ok(Issued {
            otp_id: otp.otp_id,
            delivered,
        })
    }

    /// Check `code` against the user's newest code. Each submission to a
    /// live code is counted in the store before the comparison, so parallel
    /// guesses share the same attempt budget. A match consumes the code.
    pub async fn verify(&self, user_id: &str, code: &str) -> Result<(), ServiceError> {
        let otp = self
            .store
            .find_latest_otp(user_id)
            .await?
            .ok_or(ServiceError::NoPendingCode)?;

        let now = Utc::now();
        let max_attempts = self.config.max_attempts;
        let outcome = match otp.refusal(now, max_attempts) {
            Some(refused) => refused,
            None => match self
                .store
                .count_otp_attempt(&otp.otp_id, max_attempts, now)
                .await?
            {
                // budget spent by submissions that got in first
                None => OtpCheck::AttemptsExhausted,
                Some(_) if otp.matches(code) => OtpCheck::Accepted,
                Some(attempts) => {
                    tracing::info!(
                        user_id = %user_id,
                        attempts,
                        "Wrong activation code submitted"
                    );
                    OtpCheck::WrongCode
                }
            },
        };
        metrics::record_otp_verification(outcome.as_str());

        match outcome {
            OtpCheck::Accepted => {
                // lost a race with a concurrent submission of the same code
                if !self.store.mark_otp_used(&otp.otp_id).await? {
                    return Err(ServiceError::NoPendingCode);
                }
                Ok(())
            }
            OtpCheck::AlreadyUsed => Err(ServiceError::NoPendingCode),
            OtpCheck::Expired => Err(ServiceError::CodeExpired),
            OtpCheck::AttemptsExhausted => Err(ServiceError::AttemptsExhausted),
            OtpCheck::WrongCode => Err(ServiceError::WrongCode),
        }
    }
}
