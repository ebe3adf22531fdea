//! Email one-time codes used to activate new accounts.
//!
//! Only a SHA-256 digest of the code is persisted. A record moves from
//! issued to exactly one terminal state: verified, expired, attempts
//! exhausted, or superseded by a newer code for the same user.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use uuid::Uuid;

pub const OTP_LENGTH: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailOtp {
    #[serde(rename = "_id")]
    pub otp_id: String,
    pub user_id: String,
    pub code_hash: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub is_used: bool,
}

/// Outcome of checking a submitted code against a stored OTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Accepted,
    AlreadyUsed,
    Expired,
    AttemptsExhausted,
    WrongCode,
}

impl OtpCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpCheck::Accepted => "accepted",
            OtpCheck::AlreadyUsed => "already_used",
            OtpCheck::Expired => "expired",
            OtpCheck::AttemptsExhausted => "attempts_exhausted",
            OtpCheck::WrongCode => "wrong_code",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OtpState {
    Issued,
    Verified,
    Expired,
    AttemptsExhausted,
    Superseded,
}

/// Uniformly random code, zero-padded to six digits.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

pub fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// True when `code` is exactly six ASCII digits.
pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

impl EmailOtp {
    /// Create a new OTP record. Returns the record and the plain code, which
    /// is only ever handed to the mailer.
    pub fn issue(user_id: &str, ttl: Duration, now: DateTime<Utc>) -> (Self, String) {
        let code = generate_code();
        let otp = Self {
            otp_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            code_hash: hash_code(&code),
            created_at: now,
            expires_at: now + ttl,
            attempts: 0,
            is_used: false,
        };
        (otp, code)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn matches(&self, code: &str) -> bool {
        let submitted = hash_code(code);
        submitted.as_bytes().ct_eq(self.code_hash.as_bytes()).into()
    }

    /// Why this record cannot take a submission right now, if anything.
    /// Used and expired codes are refused before an attempt is counted, and
    /// an exhausted code refuses even the correct value.
    pub fn refusal(&self, now: DateTime<Utc>, max_attempts: u32) -> Option<OtpCheck> {
        if self.is_used {
            Some(OtpCheck::AlreadyUsed)
        } else if self.is_expired_at(now) {
            Some(OtpCheck::Expired)
        } else if self.attempts >= max_attempts {
            Some(OtpCheck::AttemptsExhausted)
        } else {
            None
        }
    }

    /// State as seen in isolation. `Superseded` depends on sibling records
    /// and is assigned by the caller.
    pub fn state_at(&self, now: DateTime<Utc>, max_attempts: u32) -> OtpState {
        if self.is_used {
            OtpState::Verified
        } else if self.attempts >= max_attempts {
            OtpState::AttemptsExhausted
        } else if self.is_expired_at(now) {
            OtpState::Expired
        } else {
            OtpState::Issued
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued(now: DateTime<Utc>) -> (EmailOtp, String) {
        EmailOtp::issue("user-1", Duration::minutes(10), now)
    }

    fn wrong(code: &str) -> String {
        let n: u32 = code.parse().unwrap();
        format!("{:06}", (n + 1) % 1_000_000)
    }

    #[test]
    fn codes_are_six_zero_padded_digits() {
        for _ in 0..500 {
            let code = generate_code();
            assert!(is_well_formed(&code), "bad code {code}");
        }
        assert_eq!(format!("{:06}", 42), "000042");
        assert!(!is_well_formed("12345"));
        assert!(!is_well_formed("12345a"));
        assert!(!is_well_formed("1234567"));
    }

    #[test]
    fn only_the_hash_is_stored() {
        let (otp, code) = issued(Utc::now());
        assert_ne!(otp.code_hash, code);
        assert_eq!(otp.code_hash.len(), 64);
        assert!(otp.matches(&code));
    }

    #[test]
    fn expiry_defaults_to_ttl_from_creation() {
        let now = Utc::now();
        let (otp, _) = issued(now);
        assert_eq!(otp.expires_at - otp.created_at, Duration::minutes(10));
        assert!(!otp.is_expired_at(now + Duration::minutes(9)));
        assert!(otp.is_expired_at(now + Duration::minutes(10)));
    }

    #[test]
    fn fresh_code_takes_submissions() {
        let now = Utc::now();
        let (otp, code) = issued(now);
        assert_eq!(otp.refusal(now, 5), None);
        assert!(otp.matches(&code));
        assert!(!otp.matches(&wrong(&code)));
    }

    #[test]
    fn counted_attempts_lock_out_the_correct_code() {
        let now = Utc::now();
        let (mut otp, code) = issued(now);
        otp.attempts = 4;
        assert_eq!(otp.refusal(now, 5), None);
        otp.attempts = 5;
        assert!(otp.matches(&code));
        assert_eq!(otp.refusal(now, 5), Some(OtpCheck::AttemptsExhausted));
        assert_eq!(otp.state_at(now, 5), OtpState::AttemptsExhausted);
    }

    #[test]
    fn expired_code_is_refused() {
        let now = Utc::now();
        let (otp, _) = issued(now);
        let later = now + Duration::minutes(11);
        assert_eq!(otp.refusal(later, 5), Some(OtpCheck::Expired));
        assert_eq!(otp.state_at(later, 5), OtpState::Expired);
    }

    #[test]
    fn used_code_stays_invalid() {
        let now = Utc::now();
        let (mut otp, _) = issued(now);
        otp.is_used = true;
        assert_eq!(otp.refusal(now, 5), Some(OtpCheck::AlreadyUsed));
        assert_eq!(otp.state_at(now, 5), OtpState::Verified);
    }
}
